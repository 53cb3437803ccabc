use anyhow::{bail, Context, Result};
use fnv::FnvHasher;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    hash::Hasher,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::app::{KeyValue, MapFn, MrApp, ReduceFn};
use crate::task::{Task, TaskId, TaskKind};
use crate::worker::ProducedFile;

/* =========================
   Convenciones de nombres
   ========================= */

/// Archivo intermedio de la tarea map `map_id` para el bucket `bucket`.
pub fn intermediate_file_name(map_id: TaskId, bucket: u32) -> String {
    format!("{}-{}", map_id, bucket)
}

/// Archivo de salida final del bucket.
pub fn output_file_name(bucket: u32) -> String {
    format!("out-{}", bucket)
}

/* =========================
   Particionado por hash
   ========================= */

/// FNV-1a de 64 bits (el único que trae `fnv`) quedándose con los 31 bits
/// bajos: estable entre procesos y ejecuciones, a diferencia de
/// DefaultHasher. No coincide con FNV-1a de 32 bits, así que el reparto en
/// buckets no es el mismo que el de una implementación basada en `New32a`.
pub fn ihash(key: &str) -> u32 {
    let mut h = FnvHasher::default();
    h.write(key.as_bytes());
    (h.finish() & 0x7fff_ffff) as u32
}

pub fn bucket_for(key: &str, n_reduce: u32) -> u32 {
    ihash(key) % n_reduce
}

/// Reparte los pares en buckets por `ihash(key) % n_reduce`.
/// Sólo aparecen los buckets no vacíos; cada bucket queda ordenado por clave.
pub fn partition(kvs: Vec<KeyValue>, n_reduce: u32) -> BTreeMap<u32, Vec<KeyValue>> {
    let mut buckets: BTreeMap<u32, Vec<KeyValue>> = BTreeMap::new();

    for kv in kvs {
        let b = bucket_for(&kv.key, n_reduce);
        buckets.entry(b).or_default().push(kv);
    }

    for kvs in buckets.values_mut() {
        kvs.sort_by(|a, b| a.key.cmp(&b.key));
    }

    buckets
}

/* =========================
   Escritura / lectura en disco
   ========================= */

/// Escribe `dir/name` de forma atómica: archivo temporal en el mismo
/// directorio + rename. Una re-ejecución pisa la salida anterior entera.
fn write_atomically<F>(dir: &Path, name: &str, fill: F) -> Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    fs::create_dir_all(dir)
        .with_context(|| format!("no se pudo crear el directorio {}", dir.display()))?;

    let target = dir.join(name);
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("no se pudo crear temporal en {}", dir.display()))?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        fill(&mut writer)?;
        writer.flush()?;
    }

    tmp.persist(&target)
        .with_context(|| format!("no se pudo renombrar a {}", target.display()))?;

    Ok(target)
}

/// Un par por línea, en JSON.
pub fn write_intermediate(dir: &Path, name: &str, kvs: &[KeyValue]) -> Result<PathBuf> {
    write_atomically(dir, name, |w| {
        for kv in kvs {
            serde_json::to_writer(&mut *w, kv)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    })
}

pub fn read_intermediate(path: &Path) -> Result<Vec<KeyValue>> {
    let file = File::open(path)
        .with_context(|| format!("no se pudo abrir intermedio {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line).with_context(|| {
            format!("línea {} inválida en {}", lineno + 1, path.display())
        })?;
        out.push(kv);
    }

    Ok(out)
}

/// Lee una entrada entera. Bytes que no son UTF-8 (ej. Latin-1) se
/// reemplazan por U+FFFD en vez de fallar la tarea.
pub fn read_input(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .with_context(|| format!("no se pudo leer la entrada {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/* =========================
   Pipelines
   ========================= */

/// Pipeline map:
/// 1. lee el archivo de entrada entero
/// 2. aplica `map(nombre, contenido)`
/// 3. particiona por hash y escribe `{map_id}-{bucket}` por cada bucket no vacío
pub fn run_map_task(task: &Task, map: MapFn, work_dir: &Path) -> Result<Vec<ProducedFile>> {
    if task.kind != TaskKind::Map {
        bail!("la tarea {} no es MAP ({:?})", task.id, task.kind);
    }
    if task.n_reduce == 0 {
        bail!("la tarea {} tiene n_reduce = 0", task.id);
    }
    let input = task
        .input_file
        .as_deref()
        .with_context(|| format!("la tarea map {} no tiene archivo de entrada", task.id))?;

    let contents = read_input(Path::new(input))?;

    let kvs = map(input, &contents);
    debug!("map {}: {} pares desde {}", task.id, kvs.len(), input);

    let mut produced = Vec::new();
    for (bucket, kvs) in partition(kvs, task.n_reduce) {
        let name = intermediate_file_name(task.id, bucket);
        write_intermediate(work_dir, &name, &kvs)?;
        produced.push(ProducedFile { name, bucket });
    }

    Ok(produced)
}

/// Agrupa claves consecutivas iguales (entrada ya ordenada) y llama a reduce
/// una vez por clave. Devuelve (clave, salida) en el mismo orden.
pub fn reduce_sorted(kvs: &[KeyValue], reduce: ReduceFn) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < kvs.len() {
        let mut j = i + 1;
        while j < kvs.len() && kvs[j].key == kvs[i].key {
            j += 1;
        }
        let values: Vec<String> = kvs[i..j].iter().map(|kv| kv.value.clone()).collect();
        out.push((kvs[i].key.clone(), reduce(&kvs[i].key, &values)));
        i = j;
    }

    out
}

fn write_output(dir: &Path, name: &str, rows: &[(String, String)]) -> Result<PathBuf> {
    write_atomically(dir, name, |w| {
        for (key, value) in rows {
            writeln!(w, "{} {}", key, value)?;
        }
        Ok(())
    })
}

/// Pipeline reduce:
/// 1. lee y concatena todos los intermedios del bucket
/// 2. ordena por clave
/// 3. reduce por grupo y escribe `out-{bucket}` con líneas "clave valor"
pub fn run_reduce_task(
    task: &Task,
    intermediate_files: &[String],
    reduce: ReduceFn,
    work_dir: &Path,
) -> Result<ProducedFile> {
    if task.kind != TaskKind::Reduce {
        bail!("la tarea {} no es REDUCE ({:?})", task.id, task.kind);
    }
    let bucket = task
        .reduce_bucket
        .with_context(|| format!("la tarea reduce {} no tiene bucket", task.id))?;

    let mut all: Vec<KeyValue> = Vec::new();
    for name in intermediate_files {
        let mut kvs = read_intermediate(&work_dir.join(name))?;
        all.append(&mut kvs);
    }

    // sort estable: los valores de una clave conservan el orden de lectura
    all.sort_by(|a, b| a.key.cmp(&b.key));

    let rows = reduce_sorted(&all, reduce);
    debug!(
        "reduce {} (bucket {}): {} pares, {} claves",
        task.id,
        bucket,
        all.len(),
        rows.len()
    );

    let name = output_file_name(bucket);
    write_output(work_dir, &name, &rows)?;

    Ok(ProducedFile { name, bucket })
}

/* =========================
   Ejecución secuencial de referencia
   ========================= */

/// Corre map y reduce en un solo proceso y escribe todas las claves en
/// `output` ("clave valor" por línea, claves ordenadas).
/// Sirve para comparar contra la salida distribuida.
pub fn run_sequential(app: MrApp, inputs: &[PathBuf], output: &Path) -> Result<usize> {
    let mut all: Vec<KeyValue> = Vec::new();

    for input in inputs {
        let name = input.to_string_lossy();
        let contents = read_input(input)?;
        all.extend((app.map)(&name, &contents));
    }

    all.sort_by(|a, b| a.key.cmp(&b.key));
    let rows = reduce_sorted(&all, app.reduce);

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = output
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("ruta de salida inválida {}", output.display()))?;

    write_output(&dir, name, &rows)?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordcount;
    use std::collections::BTreeSet;

    fn write_input(dir: &Path, name: &str, contents: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().to_string()
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    /* ============
       NOMBRES / HASH
       ============ */

    #[test]
    fn nombres_siguen_la_convencion() {
        assert_eq!(intermediate_file_name(3, 1), "3-1");
        assert_eq!(output_file_name(0), "out-0");
    }

    #[test]
    fn ihash_es_estable_y_de_31_bits() {
        // FNV-1a 64 de "" es el offset basis
        assert_eq!(ihash(""), (0xcbf2_9ce4_8422_2325_u64 & 0x7fff_ffff) as u32);
        assert_eq!(ihash("hola"), ihash("hola"));
        assert!(ihash("cualquier cosa") <= 0x7fff_ffff);
    }

    #[test]
    fn partition_respeta_bucket_y_ordena() {
        let kvs = vec![
            KeyValue::new("zeta", "1"),
            KeyValue::new("alfa", "1"),
            KeyValue::new("beta", "1"),
            KeyValue::new("alfa", "2"),
        ];

        let buckets = partition(kvs, 3);

        let total: usize = buckets.values().map(|v| v.len()).sum();
        assert_eq!(total, 4);
        for (b, kvs) in &buckets {
            assert!(!kvs.is_empty());
            assert!(kvs.iter().all(|kv| bucket_for(&kv.key, 3) == *b));
            assert!(kvs.windows(2).all(|w| w[0].key <= w[1].key));
        }
    }

    /* ============
       MAP
       ============ */

    #[test]
    fn map_escribe_un_intermedio_por_bucket_no_vacio() {
        let tmp = tempfile::tempdir().unwrap();
        let input = write_input(tmp.path(), "in.txt", "a b c a d e f g");
        let task = Task::map(7, input, 4);

        let produced = run_map_task(&task, wordcount::map, tmp.path()).unwrap();

        assert!(!produced.is_empty());
        for f in &produced {
            assert_eq!(f.name, intermediate_file_name(7, f.bucket));
            let kvs = read_intermediate(&tmp.path().join(&f.name)).unwrap();
            assert!(!kvs.is_empty());
            assert!(kvs.iter().all(|kv| bucket_for(&kv.key, 4) == f.bucket));
        }

        let total: usize = produced
            .iter()
            .map(|f| read_intermediate(&tmp.path().join(&f.name)).unwrap().len())
            .sum();
        assert_eq!(total, 8);
    }

    #[test]
    fn map_reejecutado_produce_los_mismos_archivos() {
        let tmp = tempfile::tempdir().unwrap();
        let input = write_input(tmp.path(), "in.txt", "uno dos tres uno dos uno");
        let task = Task::map(0, input, 3);

        let first = run_map_task(&task, wordcount::map, tmp.path()).unwrap();
        let first_content: Vec<String> = first
            .iter()
            .map(|f| fs::read_to_string(tmp.path().join(&f.name)).unwrap())
            .collect();

        let second = run_map_task(&task, wordcount::map, tmp.path()).unwrap();
        let second_content: Vec<String> = second
            .iter()
            .map(|f| fs::read_to_string(tmp.path().join(&f.name)).unwrap())
            .collect();

        assert_eq!(first, second);
        assert_eq!(first_content, second_content);
    }

    #[test]
    fn map_con_entrada_inexistente_devuelve_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("no_existe.txt");
        let task = Task::map(0, missing.to_string_lossy(), 2);

        let res = run_map_task(&task, wordcount::map, tmp.path());

        assert!(res.is_err());
        assert!(!tmp.path().join("0-0").exists());
        assert!(!tmp.path().join("0-1").exists());
    }

    #[test]
    fn map_acepta_entradas_que_no_son_utf8() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("latin1.txt");
        fs::write(&path, b"caf\xe9 hola hola").unwrap();
        let task = Task::map(0, path.to_string_lossy(), 1);

        let produced = run_map_task(&task, wordcount::map, tmp.path()).unwrap();

        assert_eq!(produced.len(), 1);
        let kvs = read_intermediate(&tmp.path().join(&produced[0].name)).unwrap();
        let keys: Vec<&str> = kvs.iter().map(|kv| kv.key.as_str()).collect();
        // el byte 0xE9 no es alfanumérico tras el reemplazo, queda "caf"
        assert_eq!(keys, vec!["caf", "hola", "hola"]);

        let seq_out = tmp.path().join("mr-correct.txt");
        run_sequential(wordcount::APP, &[path], &seq_out).unwrap();
        assert_eq!(read_lines(&seq_out), vec!["caf 1", "hola 2"]);
    }

    #[test]
    fn map_rechaza_tareas_que_no_son_map() {
        let tmp = tempfile::tempdir().unwrap();
        let task = Task::reduce(1, 0, 1);
        assert!(run_map_task(&task, wordcount::map, tmp.path()).is_err());
    }

    /* ============
       REDUCE
       ============ */

    #[test]
    fn reduce_sorted_agrupa_claves_consecutivas() {
        let kvs = vec![
            KeyValue::new("a", "1"),
            KeyValue::new("a", "1"),
            KeyValue::new("b", "1"),
        ];
        let rows = reduce_sorted(&kvs, wordcount::reduce);
        assert_eq!(
            rows,
            vec![
                ("a".to_string(), "2".to_string()),
                ("b".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn reduce_mezcla_intermedios_y_escribe_salida_ordenada() {
        let tmp = tempfile::tempdir().unwrap();
        write_intermediate(
            tmp.path(),
            "0-1",
            &[KeyValue::new("gato", "1"), KeyValue::new("perro", "1")],
        )
        .unwrap();
        write_intermediate(
            tmp.path(),
            "1-1",
            &[KeyValue::new("ave", "1"), KeyValue::new("gato", "1")],
        )
        .unwrap();

        let task = Task::reduce(2, 1, 2);
        let files = vec!["0-1".to_string(), "1-1".to_string()];
        let produced = run_reduce_task(&task, &files, wordcount::reduce, tmp.path()).unwrap();

        assert_eq!(
            produced,
            ProducedFile {
                name: "out-1".to_string(),
                bucket: 1
            }
        );
        assert_eq!(
            read_lines(&tmp.path().join("out-1")),
            vec!["ave 1", "gato 2", "perro 1"]
        );
    }

    #[test]
    fn reduce_sin_intermedios_crea_salida_vacia() {
        let tmp = tempfile::tempdir().unwrap();
        let task = Task::reduce(5, 0, 1);

        run_reduce_task(&task, &[], wordcount::reduce, tmp.path()).unwrap();

        let content = fs::read_to_string(tmp.path().join("out-0")).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn reduce_falla_si_falta_un_intermedio() {
        let tmp = tempfile::tempdir().unwrap();
        let task = Task::reduce(5, 0, 1);
        let files = vec!["9-0".to_string()];

        assert!(run_reduce_task(&task, &files, wordcount::reduce, tmp.path()).is_err());
        assert!(!tmp.path().join("out-0").exists());
    }

    #[test]
    fn read_intermediate_reporta_lineas_corruptas() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("0-0");
        fs::write(&path, "{\"key\":\"a\",\"value\":\"1\"}\nbasura\n").unwrap();

        let err = read_intermediate(&path).unwrap_err();
        assert!(format!("{err:#}").contains("línea 2"));
    }

    /* ============
       MAP + REDUCE de punta a punta
       ============ */

    #[test]
    fn map_y_reduce_en_todos_los_buckets_igualan_al_secuencial() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        let inputs = vec![
            write_input(tmp.path(), "x.txt", "el gato y el perro\nel ave"),
            write_input(tmp.path(), "y.txt", "otro gato, otro perro; fin"),
        ];
        let n_reduce = 3;

        let mut by_bucket: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
        for (id, input) in inputs.iter().enumerate() {
            let task = Task::map(id as TaskId, input.clone(), n_reduce);
            for f in run_map_task(&task, wordcount::map, &work).unwrap() {
                by_bucket.entry(f.bucket).or_default().insert(f.name);
            }
        }

        let mut distributed: Vec<String> = Vec::new();
        for bucket in 0..n_reduce {
            let files: Vec<String> = by_bucket
                .get(&bucket)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default();
            let task = Task::reduce(2 + bucket, bucket, n_reduce);
            let out = run_reduce_task(&task, &files, wordcount::reduce, &work).unwrap();
            distributed.extend(read_lines(&work.join(out.name)));
        }
        distributed.sort();

        let seq_out = tmp.path().join("mr-correct.txt");
        let paths: Vec<PathBuf> = inputs.iter().map(PathBuf::from).collect();
        run_sequential(wordcount::APP, &paths, &seq_out).unwrap();
        let expected = read_lines(&seq_out);

        assert_eq!(distributed, expected);
        assert!(expected.contains(&"el 3".to_string()));
        assert!(expected.contains(&"gato 2".to_string()));
    }
}
