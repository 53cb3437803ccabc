use serde::{Deserialize, Serialize};

use crate::{indexer, wordcount};

/// Par clave/valor emitido por map y consumido por reduce.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// map(nombre_archivo, contenido) -> pares
pub type MapFn = fn(&str, &str) -> Vec<KeyValue>;

/// reduce(clave, valores) -> valor
pub type ReduceFn = fn(&str, &[String]) -> String;

/// Aplicación MapReduce: un par de funciones puras que se inyectan al worker.
#[derive(Clone, Copy)]
pub struct MrApp {
    pub name: &'static str,
    pub map: MapFn,
    pub reduce: ReduceFn,
}

impl std::fmt::Debug for MrApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MrApp").field("name", &self.name).finish()
    }
}

pub const APPS: &[MrApp] = &[wordcount::APP, indexer::APP];

/// Busca una aplicación por nombre ("wordcount", "indexer").
pub fn lookup(name: &str) -> Option<MrApp> {
    APPS.iter().copied().find(|app| app.name == name)
}

pub fn app_names() -> Vec<&'static str> {
    APPS.iter().map(|app| app.name).collect()
}
