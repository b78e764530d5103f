//! In-process server simulation used by the integration tests.
//!
//! Stores collections in memory, evaluates a small subset of pipeline
//! stages, and serves results through cursors batched the way a real server
//! does: 101 documents by default in the first batch, an explicit
//! `batchSize` when given, and a 16 MiB byte budget on every batch.

#![allow(dead_code)]

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongo_aggregate::{MongoError, Result, Transport};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const DEFAULT_FIRST_BATCH: usize = 101;
pub const MAX_BATCH_BYTES: usize = 16 * 1024 * 1024;

/// Something that goes wrong on a chosen `getMore`.
#[derive(Debug, Clone)]
pub enum Fault {
    /// The transport call itself fails.
    Network,
    /// The server answers `ok: 0` with this code.
    Server(i32),
    /// The reply has no cursor descriptor.
    Malformed,
}

struct OpenCursor {
    ns: String,
    remaining: VecDeque<Document>,
}

#[derive(Default)]
struct ServerState {
    collections: HashMap<String, Vec<Document>>,
    cursors: HashMap<i64, OpenCursor>,
    next_cursor_id: i64,
    profile: Vec<(String, Document)>,
    get_more_limit: Option<usize>,
    get_more_count: usize,
    faults: HashMap<usize, Fault>,
    killed: Vec<i64>,
}

#[derive(Default)]
pub struct SimulatedServer {
    state: Mutex<ServerState>,
}

impl SimulatedServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_many(&self, coll: &str, docs: impl IntoIterator<Item = Document>) {
        let mut state = self.state.lock().unwrap();
        let stored = state.collections.entry(coll.to_string()).or_default();
        for mut document in docs {
            if !document.contains_key("_id") {
                document.insert("_id", bson::oid::ObjectId::new());
            }
            stored.push(document);
        }
    }

    /// Cap the number of documents in every `getMore` reply.
    pub fn set_get_more_limit(&self, limit: usize) {
        self.state.lock().unwrap().get_more_limit = Some(limit);
    }

    /// Make the `n`th `getMore` (1-based) fail.
    pub fn fail_get_more(&self, n: usize, fault: Fault) {
        self.state.lock().unwrap().faults.insert(n, fault);
    }

    /// Every command received, with the database it was addressed to.
    pub fn profile(&self) -> Vec<(String, Document)> {
        self.state.lock().unwrap().profile.clone()
    }

    pub fn commands_named(&self, name: &str) -> Vec<Document> {
        self.profile()
            .into_iter()
            .filter(|(_, command)| command.keys().next().map(String::as_str) == Some(name))
            .map(|(_, command)| command)
            .collect()
    }

    pub fn get_more_count(&self) -> usize {
        self.state.lock().unwrap().get_more_count
    }

    pub fn killed(&self) -> Vec<i64> {
        self.state.lock().unwrap().killed.clone()
    }

    pub fn open_cursors(&self) -> usize {
        self.state.lock().unwrap().cursors.len()
    }

    fn handle(&self, database: &str, command: Document) -> Result<Document> {
        let mut state = self.state.lock().unwrap();
        state.profile.push((database.to_string(), command.clone()));

        match command.keys().next().map(String::as_str) {
            Some("aggregate") => Ok(state.aggregate(database, &command)),
            Some("getMore") => state.get_more(database, &command),
            Some("killCursors") => Ok(state.kill_cursors(&command)),
            Some(other) => Ok(doc! {
                "ok": 0.0,
                "errmsg": format!("no such command: '{}'", other),
                "code": 59,
                "codeName": "CommandNotFound",
            }),
            None => Ok(doc! { "ok": 0.0, "errmsg": "empty command", "code": 2 }),
        }
    }
}

#[async_trait]
impl Transport for SimulatedServer {
    async fn run_command(&self, database: &str, command: Document) -> Result<Document> {
        // Let other in-flight operations interleave with this one.
        tokio::task::yield_now().await;
        self.handle(database, command)
    }
}

impl ServerState {
    fn aggregate(&mut self, database: &str, command: &Document) -> Document {
        let coll = match command.get("aggregate") {
            Some(Bson::String(name)) => name.clone(),
            _ => "$cmd.aggregate".to_string(),
        };
        let ns = format!("{}.{}", database, coll);

        let stages = match command.get_array("pipeline") {
            Ok(stages) => stages.clone(),
            Err(_) => return doc! { "ok": 0.0, "errmsg": "pipeline must be an array", "code": 14 },
        };
        let batch_size = match command.get_document("cursor") {
            Ok(cursor) => cursor.get_i32("batchSize").ok().map(|n| n as usize),
            Err(_) => {
                return doc! {
                    "ok": 0.0,
                    "errmsg": "The 'cursor' option is required",
                    "code": 9,
                }
            }
        };

        let input = self.collections.get(&coll).cloned().unwrap_or_default();
        let output = match run_pipeline(input, &stages) {
            Ok(output) => output,
            Err(message) => return doc! { "ok": 0.0, "errmsg": message, "code": 40324 },
        };

        let mut remaining: VecDeque<Document> = output.into();
        let first_batch = take_batch(&mut remaining, batch_size.unwrap_or(DEFAULT_FIRST_BATCH));

        // A zero batch size always leaves a cursor to probe, even for an empty result.
        let id = if remaining.is_empty() && batch_size != Some(0) {
            0
        } else {
            self.next_cursor_id += 1;
            let id = 1_000_000 + self.next_cursor_id;
            self.cursors.insert(id, OpenCursor { ns: ns.clone(), remaining });
            id
        };

        doc! {
            "cursor": { "firstBatch": first_batch, "id": id, "ns": ns },
            "ok": 1.0,
        }
    }

    fn get_more(&mut self, database: &str, command: &Document) -> Result<Document> {
        self.get_more_count += 1;
        let id = command.get_i64("getMore").unwrap_or(0);

        match self.faults.remove(&self.get_more_count) {
            Some(Fault::Network) => {
                return Err(MongoError::Network("connection reset by peer".into()));
            }
            Some(Fault::Server(code)) => {
                return Ok(doc! { "ok": 0.0, "errmsg": "injected failure", "code": code });
            }
            Some(Fault::Malformed) => return Ok(doc! { "ok": 1.0, "unexpected": true }),
            None => {}
        }

        let coll = command.get_str("collection").unwrap_or_default();
        let ns = format!("{}.{}", database, coll);
        let limit = self.get_more_limit.unwrap_or(usize::MAX);

        let Some(cursor) = self.cursors.get_mut(&id) else {
            return Ok(doc! {
                "ok": 0.0,
                "errmsg": format!("cursor id {} not found", id),
                "code": 43,
                "codeName": "CursorNotFound",
            });
        };
        if cursor.ns != ns {
            return Ok(doc! { "ok": 0.0, "errmsg": "namespace mismatch", "code": 13 });
        }

        let next_batch = take_batch(&mut cursor.remaining, limit);
        let next_id = if cursor.remaining.is_empty() {
            self.cursors.remove(&id);
            0
        } else {
            id
        };

        Ok(doc! {
            "cursor": { "nextBatch": next_batch, "id": next_id, "ns": ns },
            "ok": 1.0,
        })
    }

    fn kill_cursors(&mut self, command: &Document) -> Document {
        let ids: Vec<i64> = command
            .get_array("cursors")
            .map(|ids| ids.iter().filter_map(Bson::as_i64).collect())
            .unwrap_or_default();
        let mut killed = Vec::new();
        let mut not_found = Vec::new();
        for id in ids {
            self.killed.push(id);
            if self.cursors.remove(&id).is_some() {
                killed.push(id);
            } else {
                not_found.push(id);
            }
        }
        doc! { "cursorsKilled": killed, "cursorsNotFound": not_found, "ok": 1.0 }
    }
}

fn bson_len(document: &Document) -> usize {
    let mut buf = Vec::new();
    document.to_writer(&mut buf).map(|_| buf.len()).unwrap_or(0)
}

/// Take up to `count` documents within the byte budget, always at least one
/// when `count` allows it.
fn take_batch(remaining: &mut VecDeque<Document>, count: usize) -> Vec<Bson> {
    let mut batch = Vec::new();
    let mut bytes = 0;
    while batch.len() < count {
        let Some(next) = remaining.front() else { break };
        let size = bson_len(next);
        if !batch.is_empty() && bytes + size > MAX_BATCH_BYTES {
            break;
        }
        bytes += size;
        if let Some(document) = remaining.pop_front() {
            batch.push(Bson::Document(document));
        }
    }
    batch
}

fn run_pipeline(mut docs: Vec<Document>, stages: &[Bson]) -> std::result::Result<Vec<Document>, String> {
    for stage in stages {
        let stage = stage.as_document().ok_or("stage must be a document")?;
        let (name, args) = stage.iter().next().ok_or("empty stage")?;
        docs = match name.as_str() {
            "$match" => {
                let filter = args.as_document().ok_or("$match needs a document")?;
                docs.into_iter()
                    .filter(|d| filter.iter().all(|(k, v)| d.get(k) == Some(v)))
                    .collect()
            }
            "$project" => {
                let args = args.as_document().ok_or("$project needs a document")?;
                docs.iter().map(|d| project(d, args)).collect()
            }
            "$group" => {
                let args = args.as_document().ok_or("$group needs a document")?;
                group(&docs, args)?
            }
            "$sort" => {
                let args = args.as_document().ok_or("$sort needs a document")?;
                let (key, dir) = args.iter().next().ok_or("empty $sort")?;
                let descending = matches!(dir, Bson::Int32(-1) | Bson::Int64(-1));
                docs.sort_by(|a, b| {
                    let ord = compare(a.get(key), b.get(key));
                    if descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                });
                docs
            }
            other => return Err(format!("unsupported stage {}", other)),
        };
    }
    Ok(docs)
}

fn resolve(document: &Document, expr: &Bson) -> Bson {
    match expr {
        Bson::String(path) if path.starts_with('$') => {
            document.get(&path[1..]).cloned().unwrap_or(Bson::Null)
        }
        other => other.clone(),
    }
}

fn project(document: &Document, args: &Document) -> Document {
    let mut out = Document::new();
    let exclude_id = matches!(args.get("_id"), Some(Bson::Int32(0)) | Some(Bson::Boolean(false)));
    if !exclude_id {
        if let Some(id) = document.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for (key, value) in args {
        if key == "_id" {
            continue;
        }
        match value {
            Bson::Int32(1) | Bson::Int64(1) | Bson::Boolean(true) => {
                if let Some(v) = document.get(key) {
                    out.insert(key.clone(), v.clone());
                }
            }
            expr => {
                out.insert(key.clone(), resolve(document, expr));
            }
        }
    }
    out
}

fn group(docs: &[Document], args: &Document) -> std::result::Result<Vec<Document>, String> {
    let id_expr = args.get("_id").ok_or("$group needs an _id")?;
    let mut order: Vec<Document> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut sums: Vec<HashMap<String, i64>> = Vec::new();

    for document in docs {
        let key = resolve(document, id_expr);
        let slot = *index.entry(format!("{:?}", key)).or_insert_with(|| {
            order.push(doc! { "_id": key.clone() });
            sums.push(HashMap::new());
            order.len() - 1
        });
        for (field, acc) in args {
            if field == "_id" {
                continue;
            }
            let acc = acc.as_document().ok_or("accumulator must be a document")?;
            let expr = acc.get("$sum").ok_or("only $sum is supported")?;
            let n = match resolve(document, expr) {
                Bson::Int32(n) => i64::from(n),
                Bson::Int64(n) => n,
                _ => 0,
            };
            *sums[slot].entry(field.clone()).or_insert(0) += n;
        }
    }

    for (slot, out) in order.iter_mut().enumerate() {
        for (field, _) in args.iter().filter(|(f, _)| f.as_str() != "_id") {
            let total = sums[slot].get(field).copied().unwrap_or(0);
            match i32::try_from(total) {
                Ok(n) => out.insert(field.clone(), n),
                Err(_) => out.insert(field.clone(), total),
            };
        }
    }
    Ok(order)
}

fn compare(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    fn number(v: &Bson) -> Option<f64> {
        match v {
            Bson::Int32(n) => Some(f64::from(*n)),
            Bson::Int64(n) => Some(*n as f64),
            Bson::Double(n) => Some(*n),
            _ => None,
        }
    }
    match (a, b) {
        (Some(Bson::String(x)), Some(Bson::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (number(x), number(y)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
