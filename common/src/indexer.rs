use std::collections::BTreeSet;

use crate::app::{KeyValue, MrApp};
use crate::wordcount::clean_token;

/// Índice invertido: palabra -> documentos donde aparece.
pub const APP: MrApp = MrApp {
    name: "indexer",
    map,
    reduce,
};

/// Emite (palabra, documento) una sola vez por palabra distinta del documento.
pub fn map(file_name: &str, contents: &str) -> Vec<KeyValue> {
    let words: BTreeSet<String> = contents
        .split_whitespace()
        .map(clean_token)
        .filter(|w| !w.is_empty())
        .collect();

    words
        .into_iter()
        .map(|w| KeyValue::new(w, file_name))
        .collect()
}

/// "N doc1,doc2,..." con documentos únicos y ordenados.
pub fn reduce(_key: &str, values: &[String]) -> String {
    let docs: BTreeSet<&str> = values.iter().map(String::as_str).collect();
    let list: Vec<&str> = docs.into_iter().collect();
    format!("{} {}", list.len(), list.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_emite_cada_palabra_una_vez_por_documento() {
        let kvs = map("a.txt", "uno dos uno Dos");
        assert_eq!(
            kvs,
            vec![KeyValue::new("dos", "a.txt"), KeyValue::new("uno", "a.txt")]
        );
    }

    #[test]
    fn reduce_lista_documentos_ordenados_sin_repetir() {
        let values = vec![
            "b.txt".to_string(),
            "a.txt".to_string(),
            "b.txt".to_string(),
        ];
        assert_eq!(reduce("uno", &values), "2 a.txt,b.txt");
    }
}
