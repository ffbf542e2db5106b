use crate::error::GfsError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const WRITE_SUCCESS: &str = "Write success";
pub const WRITE_FAILED: &str = "Write failed";

const READ_BLOCK_SIZE: usize = 8192;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MasterRequest {
    Read { file_name: String },
    Write { file_name: String },
}

impl MasterRequest {
    pub fn file_name(&self) -> &str {
        match self {
            MasterRequest::Read { file_name } | MasterRequest::Write { file_name } => file_name,
        }
    }
}

/// Location of a file's primary, sent back for write lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryLocation {
    pub address: String,
    pub port: u16,
}

impl PrimaryLocation {
    pub fn tcp_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// What the master writes back. Reads get a bare `host:port`, writes get a
/// json `PrimaryLocation`, failures get an in-band error string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MasterResponse {
    Address(String),
    Primary(PrimaryLocation),
    Error(GfsError),
}

impl MasterResponse {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            MasterResponse::Address(address) => address.as_bytes().to_vec(),
            MasterResponse::Primary(location) => match serde_json::to_vec(location) {
                Ok(v) => v,
                Err(e) => GfsError::Protocol(e.to_string()).to_string().into_bytes(),
            },
            MasterResponse::Error(e) => e.to_string().into_bytes(),
        }
    }
    pub fn decode_read(raw: &[u8]) -> Result<String, GfsError> {
        let response = String::from_utf8_lossy(raw).trim().to_owned();
        if let Some(e) = GfsError::from_response(&response) {
            return Err(e);
        }
        if !response.contains(':') {
            return Err(GfsError::Protocol(format!(
                "Invalid chunk server address format : {response}"
            )));
        }
        Ok(response)
    }
    pub fn decode_write(raw: &[u8]) -> Result<PrimaryLocation, GfsError> {
        let response = String::from_utf8_lossy(raw);
        if let Some(e) = GfsError::from_response(&response) {
            return Err(e);
        }
        serde_json::from_slice(raw).map_err(|e| GfsError::Protocol(e.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteRole {
    #[default]
    Primary,
    Secondary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChunkRequest {
    Read {
        file_name: String,
    },
    Write {
        file_name: String,
        data: String,
        #[serde(rename = "server", default)]
        role: WriteRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        write_id: Option<String>,
    },
    Rollback {
        file_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        write_id: Option<String>,
    },
}

/// Reads one json message off the stream. Senders may or may not half-close
/// after the request, so the read stops as soon as a full object arrived.
/// Returns `Ok(None)` when the peer closed without sending anything, which is
/// what liveness probes do.
pub async fn read_message<T: DeserializeOwned>(
    stream: &mut (impl AsyncRead + Unpin),
    max_bytes: usize,
) -> Result<Option<T>, GfsError> {
    let mut buf = Vec::new();
    let mut block = vec![0u8; READ_BLOCK_SIZE];
    loop {
        let n = stream
            .read(&mut block)
            .await
            .map_err(|e| GfsError::Connection(e.to_string()))?;
        if n == 0 {
            if buf.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            return serde_json::from_slice(&buf)
                .map(Some)
                .map_err(|e| GfsError::Protocol(e.to_string()));
        }
        buf.extend_from_slice(&block[..n]);
        // every message is an object, it can only be complete once a `}` arrived
        if block[..n].contains(&b'}') {
            match serde_json::Deserializer::from_slice(&buf).into_iter::<T>().next() {
                Some(Ok(message)) => return Ok(Some(message)),
                Some(Err(e)) if e.is_eof() => {}
                Some(Err(e)) => return Err(GfsError::Protocol(e.to_string())),
                None => {}
            }
        }
        if buf.len() > max_bytes {
            return Err(GfsError::Protocol(format!(
                "message exceeds the limit of {max_bytes} bytes"
            )));
        }
    }
}

pub async fn write_message<T: Serialize>(
    stream: &mut (impl AsyncWrite + Unpin),
    message: &T,
) -> Result<(), GfsError> {
    let raw = serde_json::to_vec(message).map_err(|e| GfsError::Protocol(e.to_string()))?;
    stream
        .write_all(&raw)
        .await
        .map_err(|e| GfsError::Connection(e.to_string()))?;
    stream
        .flush()
        .await
        .map_err(|e| GfsError::Connection(e.to_string()))
}

/// Reads a response until the peer closes the connection.
pub async fn read_response(
    stream: &mut (impl AsyncRead + Unpin),
    max_bytes: usize,
) -> Result<Vec<u8>, GfsError> {
    let mut response = Vec::new();
    let read = stream
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut response)
        .await
        .map_err(|e| GfsError::Connection(e.to_string()))?;
    if read > max_bytes {
        return Err(GfsError::Protocol(format!(
            "response exceeds the limit of {max_bytes} bytes"
        )));
    }
    Ok(response)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;
    use tokio::io::duplex;

    #[tokio::test]
    async fn decodes_write_request_with_wire_field_names() {
        let raw = br#"{"type": "write", "file_name": "report.txt", "data": "hello", "server": "secondary"}"#;
        let mut cursor = Cursor::new(raw.to_vec());
        let request: ChunkRequest = read_message(&mut cursor, 1024).await.unwrap().unwrap();
        assert_eq!(
            request,
            ChunkRequest::Write {
                file_name: "report.txt".to_owned(),
                data: "hello".to_owned(),
                role: WriteRole::Secondary,
                write_id: None,
            }
        );
    }

    #[tokio::test]
    async fn rollback_serializes_without_write_id() {
        let request = ChunkRequest::Rollback {
            file_name: "report.txt".to_owned(),
            write_id: None,
        };
        let raw = serde_json::to_string(&request).unwrap();
        assert_eq!(raw, r#"{"type":"rollback","file_name":"report.txt"}"#);
    }

    #[tokio::test]
    async fn reads_message_split_across_writes_without_close() {
        let (mut client, mut server) = duplex(64);
        let payload = "x{\"}".repeat(50);
        let request = ChunkRequest::Write {
            file_name: "report.txt".to_owned(),
            data: payload.clone(),
            role: WriteRole::Primary,
            write_id: Some("w1".to_owned()),
        };
        let raw = serde_json::to_vec(&request).unwrap();
        let writer = tokio::spawn(async move {
            for part in raw.chunks(7) {
                client.write_all(part).await.unwrap();
            }
            // keep the connection open until the reader is done
            client
        });
        let decoded: ChunkRequest = read_message(&mut server, 1 << 20).await.unwrap().unwrap();
        assert_eq!(decoded, request);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn empty_connection_yields_nothing() {
        let mut cursor = Cursor::new(Vec::new());
        let decoded: Option<MasterRequest> = read_message(&mut cursor, 1024).await.unwrap();
        assert!(decoded.is_none());
    }

    #[tokio::test]
    async fn truncated_message_is_a_protocol_error() {
        let mut cursor = Cursor::new(br#"{"type":"read","file_name":"rep"#.to_vec());
        let decoded = read_message::<MasterRequest>(&mut cursor, 1024).await;
        assert!(matches!(decoded, Err(GfsError::Protocol(_))));

        let mut cursor = Cursor::new(br#"{"type":"read" "file_name"}"#.to_vec());
        let decoded = read_message::<MasterRequest>(&mut cursor, 1024).await;
        assert!(matches!(decoded, Err(GfsError::Protocol(_))));
    }

    #[tokio::test]
    async fn rejects_oversized_messages() {
        let raw = format!(r#"{{"type":"read","file_name":"{}"}}"#, "a".repeat(20_000));
        let mut cursor = Cursor::new(raw.into_bytes());
        let decoded = read_message::<MasterRequest>(&mut cursor, 1024).await;
        assert!(matches!(decoded, Err(GfsError::Protocol(_))));
    }

    #[test]
    fn master_responses_keep_their_encodings() {
        let read = MasterResponse::Address("127.0.0.1:6001".to_owned()).encode();
        assert_eq!(read, b"127.0.0.1:6001");
        assert_eq!(
            MasterResponse::decode_read(&read).unwrap(),
            "127.0.0.1:6001"
        );

        let write = MasterResponse::Primary(PrimaryLocation {
            address: "127.0.0.1".to_owned(),
            port: 6001,
        })
        .encode();
        let location = MasterResponse::decode_write(&write).unwrap();
        assert_eq!(location.tcp_address(), "127.0.0.1:6001");

        let error = MasterResponse::Error(GfsError::FileNotFound("x".to_owned())).encode();
        assert!(matches!(
            MasterResponse::decode_read(&error),
            Err(GfsError::FileNotFound(_))
        ));
        assert!(matches!(
            MasterResponse::decode_write(&error),
            Err(GfsError::FileNotFound(_))
        ));
    }
}
