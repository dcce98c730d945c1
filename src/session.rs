/// Cookie-session key holding the signed-in user's id.
pub const USER_ID: &str = "user_id";
