//! Keyword matcher over a fixed FAQ list.

use std::{collections::HashSet, sync::Arc};

use anyhow::Context;
use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{include_res, AppError, AppResult, AppState};

const FALLBACK: &str =
    "Sorry, I don't know that one yet. Try asking about projects, events, quizzes, tasks, messages or reports.";
const GREETING: &str = "Hi! Ask me anything about the club: joining, events, projects, quizzes or messaging.";

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "can", "do", "does", "for", "how", "i", "in", "is", "it", "me", "my", "of", "on",
    "or", "the", "to", "what", "where", "who", "with", "you",
];
const GREETINGS: &[&str] = &["hi", "hello", "hey", "hiya", "howdy"];

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    pub question: String,
    pub keywords: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Default)]
pub struct Faq {
    entries: Vec<(Entry, HashSet<String>)>,
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
}

impl Faq {
    pub fn new(entries: Vec<Entry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let question_words = words(&entry.question).collect();
                (entry, question_words)
            })
            .collect();
        Faq { entries }
    }

    pub fn embedded() -> anyhow::Result<Self> {
        let entries = include_res!(json, "/faq.json").context("unable to parse faq.json")?;
        Ok(Faq::new(entries))
    }

    /// Best entry for `message`: two points per keyword hit, one per word
    /// shared with the question. Ties go to the earlier entry.
    pub fn best_match(&self, message: &str) -> Option<&Entry> {
        let asked: HashSet<String> = words(message).collect();

        let mut best: Option<(&Entry, usize)> = None;
        for (entry, question_words) in &self.entries {
            let keyword_hits = entry
                .keywords
                .iter()
                .filter(|keyword| asked.contains(&keyword.to_lowercase()))
                .count();
            let overlap = question_words.intersection(&asked).count();
            let score = keyword_hits * 2 + overlap;

            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((entry, score));
            }
        }
        best.map(|(entry, _)| entry)
    }
}

#[derive(Debug, Deserialize)]
pub struct Ask {
    message: String,
}

#[derive(Debug, Serialize)]
pub struct Reply {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

pub fn answer(faq: &Faq, message: &str) -> Reply {
    if let Some(entry) = faq.best_match(message) {
        return Reply { reply: entry.answer.clone(), question: Some(entry.question.clone()) };
    }

    let greeted = message
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| GREETINGS.contains(&word.to_lowercase().as_str()));
    let reply = if greeted { GREETING } else { FALLBACK };
    Reply { reply: reply.to_owned(), question: None }
}

#[debug_handler(state = AppState)]
pub async fn reply(State(faq): State<Arc<Faq>>, Json(Ask { message }): Json<Ask>) -> AppResult<Json<Reply>> {
    if message.trim().is_empty() {
        return Err(AppError::bad_request("message is empty"));
    }
    Ok(Json(answer(&faq, &message)))
}
