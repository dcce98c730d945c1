/// Embeds a file from `res/` at compile time.
///
/// `str` and `bytes` yield the raw contents; `json` parses them with
/// `serde_json` into whatever the call site expects.
#[macro_export]
macro_rules! include_res {
    (str, $path:literal) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $path))
    };
    (bytes, $path:literal) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $path))
    };
    (json, $path:literal) => {
        serde_json::from_str($crate::include_res!(str, $path))
    };
}
