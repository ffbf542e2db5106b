use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use serde::Deserialize;

use crate::error::GfsError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkServerRecord {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl ChunkServerRecord {
    pub fn new(id: &str, host: &str, port: u16) -> Self {
        Self {
            id: id.to_owned(),
            host: host.to_owned(),
            port,
        }
    }
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
struct FileMetadata {
    replicas: Vec<String>,
}

// servers.json entries are either `["host", port]` or `{"address": .., "port": ..}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServerEntry {
    Pair(String, u16),
    Object { address: String, port: u16 },
}

/// Static placement of files on chunk servers, loaded once at startup.
///
/// The first replica of a file is its primary.
#[derive(Clone, Debug, Default)]
pub struct ReplicaDirectory {
    servers: HashMap<String, ChunkServerRecord>,
    // registry order, kept so every walk over the servers is deterministic
    server_order: Vec<String>,
    files: HashMap<String, Vec<String>>,
}

impl ReplicaDirectory {
    pub fn new(
        servers: Vec<ChunkServerRecord>,
        files: HashMap<String, Vec<String>>,
    ) -> Result<Self, GfsError> {
        let mut server_map = HashMap::new();
        let mut server_order = Vec::with_capacity(servers.len());
        for server in servers {
            if server_map.contains_key(&server.id) {
                return Err(GfsError::Config(format!(
                    "chunk server {} registered twice",
                    server.id
                )));
            }
            server_order.push(server.id.clone());
            server_map.insert(server.id.clone(), server);
        }
        for (file_name, replicas) in &files {
            if replicas.is_empty() {
                return Err(GfsError::Config(format!(
                    "file {file_name} has no replicas"
                )));
            }
            let mut seen = HashSet::new();
            for replica in replicas {
                if !server_map.contains_key(replica) {
                    return Err(GfsError::Config(format!(
                        "file {file_name} is placed on unknown chunk server {replica}"
                    )));
                }
                if !seen.insert(replica) {
                    return Err(GfsError::Config(format!(
                        "file {file_name} lists chunk server {replica} more than once"
                    )));
                }
            }
        }
        Ok(Self {
            servers: server_map,
            server_order,
            files,
        })
    }

    /// Parses the contents of `files_metadata.json` and `servers.json`.
    pub fn from_json(files_metadata: &str, servers: &str) -> Result<Self, GfsError> {
        let files_metadata: HashMap<String, FileMetadata> = serde_json::from_str(files_metadata)
            .map_err(|e| GfsError::Config(format!("files metadata : {e}")))?;
        let server_entries: HashMap<String, ServerEntry> = serde_json::from_str(servers)
            .map_err(|e| GfsError::Config(format!("server registry : {e}")))?;
        let mut records: Vec<ChunkServerRecord> = server_entries
            .into_iter()
            .map(|(id, entry)| {
                let (host, port) = match entry {
                    ServerEntry::Pair(host, port) => (host, port),
                    ServerEntry::Object { address, port } => (address, port),
                };
                ChunkServerRecord { id, host, port }
            })
            .collect();
        // json objects carry no order, sort so probing and logs are stable
        records.sort_by(|a, b| a.id.cmp(&b.id));
        let files = files_metadata
            .into_iter()
            .map(|(file_name, metadata)| (file_name, metadata.replicas))
            .collect();
        Self::new(records, files)
    }

    pub fn load(files_metadata_path: &Path, servers_path: &Path) -> Result<Self, GfsError> {
        let files_metadata = std::fs::read_to_string(files_metadata_path).map_err(|e| {
            GfsError::Config(format!("can't read {} : {e}", files_metadata_path.display()))
        })?;
        let servers = std::fs::read_to_string(servers_path).map_err(|e| {
            GfsError::Config(format!("can't read {} : {e}", servers_path.display()))
        })?;
        Self::from_json(&files_metadata, &servers)
    }

    pub fn replicas(&self, file_name: &str) -> Option<&[String]> {
        self.files.get(file_name).map(Vec::as_slice)
    }

    pub fn primary(&self, file_name: &str) -> Option<&ChunkServerRecord> {
        let primary_id = self.replicas(file_name)?.first()?;
        self.servers.get(primary_id)
    }

    /// Replica set of the file minus `self_id`, resolved to addresses, in
    /// placement order.
    pub fn secondaries(&self, file_name: &str, self_id: &str) -> Vec<ChunkServerRecord> {
        self.replicas(file_name)
            .unwrap_or_default()
            .iter()
            .filter(|replica| replica.as_str() != self_id)
            .filter_map(|replica| self.servers.get(replica).cloned())
            .collect()
    }

    pub fn server(&self, server_id: &str) -> Option<&ChunkServerRecord> {
        self.servers.get(server_id)
    }

    pub fn servers(&self) -> impl Iterator<Item = &ChunkServerRecord> {
        self.server_order
            .iter()
            .filter_map(|server_id| self.servers.get(server_id))
    }

    pub fn files_managed_by(&self, server_id: &str) -> HashSet<String> {
        self.files
            .iter()
            .filter(|(_, replicas)| replicas.iter().any(|replica| replica == server_id))
            .map(|(file_name, _)| file_name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILES: &str = r#"{
        "report.txt": {"replicas": ["A", "B", "C"]},
        "notes.txt": {"replicas": ["B", "A"]}
    }"#;
    const SERVERS: &str = r#"{
        "A": ["127.0.0.1", 6001],
        "B": {"address": "127.0.0.1", "port": 6002},
        "C": ["127.0.0.1", 6003]
    }"#;

    #[test]
    fn loads_both_registry_formats() {
        let directory = ReplicaDirectory::from_json(FILES, SERVERS).unwrap();
        assert_eq!(directory.server("A").unwrap().address(), "127.0.0.1:6001");
        assert_eq!(directory.server("B").unwrap().address(), "127.0.0.1:6002");
        let ids: Vec<_> = directory.servers().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn primary_is_first_replica() {
        let directory = ReplicaDirectory::from_json(FILES, SERVERS).unwrap();
        assert_eq!(directory.primary("report.txt").unwrap().id, "A");
        assert_eq!(directory.primary("notes.txt").unwrap().id, "B");
        assert!(directory.primary("missing.txt").is_none());
    }

    #[test]
    fn secondaries_exclude_self_and_keep_order() {
        let directory = ReplicaDirectory::from_json(FILES, SERVERS).unwrap();
        let secondaries: Vec<_> = directory
            .secondaries("report.txt", "A")
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(secondaries, vec!["B", "C"]);
        assert!(directory.secondaries("missing.txt", "A").is_empty());
    }

    #[test]
    fn managed_files_per_server() {
        let directory = ReplicaDirectory::from_json(FILES, SERVERS).unwrap();
        let managed_by_c = directory.files_managed_by("C");
        assert_eq!(managed_by_c.len(), 1);
        assert!(managed_by_c.contains("report.txt"));
        assert_eq!(directory.files_managed_by("A").len(), 2);
    }

    #[test]
    fn rejects_unknown_and_duplicate_replicas() {
        let unknown = r#"{"report.txt": {"replicas": ["A", "Z"]}}"#;
        assert!(matches!(
            ReplicaDirectory::from_json(unknown, SERVERS),
            Err(GfsError::Config(_))
        ));
        let duplicate = r#"{"report.txt": {"replicas": ["A", "A"]}}"#;
        assert!(matches!(
            ReplicaDirectory::from_json(duplicate, SERVERS),
            Err(GfsError::Config(_))
        ));
        let empty = r#"{"report.txt": {"replicas": []}}"#;
        assert!(matches!(
            ReplicaDirectory::from_json(empty, SERVERS),
            Err(GfsError::Config(_))
        ));
        assert!(matches!(
            ReplicaDirectory::from_json("not json", SERVERS),
            Err(GfsError::Config(_))
        ));
    }
}
