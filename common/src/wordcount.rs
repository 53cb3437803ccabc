use crate::app::{KeyValue, MrApp};

pub const APP: MrApp = MrApp {
    name: "wordcount",
    map,
    reduce,
};

/// Normaliza una palabra: sólo alfanumérico y '_', en minúscula.
pub(crate) fn clean_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

/// Emite ("palabra", "1") por cada palabra del contenido.
pub fn map(_file_name: &str, contents: &str) -> Vec<KeyValue> {
    contents
        .split_whitespace()
        .map(clean_token)
        .filter(|w| !w.is_empty())
        .map(|w| KeyValue::new(w, "1"))
        .collect()
}

/// Cuenta cuántas veces apareció la palabra.
pub fn reduce(_key: &str, values: &[String]) -> String {
    values.len().to_string()
}
