//! Length-prefixed JSON framing used by the Debug Adapter Protocol.
//!
//! Frames look like `Content-Length: <n>\r\n\r\n<payload>` where `n` is the
//! byte length of the UTF-8 JSON payload that follows. The decoder accepts
//! arbitrary chunk boundaries and multiple messages per chunk.

use serde_json::Value;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Incrementally decodes a byte stream into complete DAP JSON messages.
#[derive(Default)]
pub struct DapFrameDecoder {
    buf: Vec<u8>,
}

impl DapFrameDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Drain every complete message currently buffered. A header that
    /// cannot be parsed is discarded up through its terminator so the
    /// decoder keeps making progress on the remaining bytes.
    pub fn drain_messages(&mut self) -> Vec<Value> {
        let mut messages = Vec::new();

        loop {
            let Some(header_end) = find_subslice(&self.buf, HEADER_TERMINATOR) else {
                break;
            };

            let header = String::from_utf8_lossy(&self.buf[..header_end]).to_string();
            let content_length = header
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.trim().eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                });

            let body_start = header_end + HEADER_TERMINATOR.len();

            let Some(len) = content_length else {
                // Unparseable header: drop it and keep scanning.
                self.buf.drain(..body_start);
                continue;
            };

            if self.buf.len() < body_start + len {
                // Body hasn't fully arrived yet.
                break;
            }

            let body = &self.buf[body_start..body_start + len];
            match serde_json::from_slice::<Value>(body) {
                Ok(value) => messages.push(value),
                Err(_) => {
                    // Malformed body for an otherwise well-formed header: skip it.
                }
            }

            self.buf.drain(..body_start + len);
        }

        messages
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Serialize a DAP message into wire bytes with its `Content-Length` header.
pub fn encode(value: &Value) -> Vec<u8> {
    let payload = serde_json::to_vec(value).expect("DAP value is always serializable");
    let mut out = format!("Content-Length: {}\r\n\r\n", payload.len()).into_bytes();
    out.extend_from_slice(&payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_single_message() {
        let msg = json!({"seq": 1, "type": "request", "command": "initialize"});
        let bytes = encode(&msg);
        let mut decoder = DapFrameDecoder::new();
        decoder.push(&bytes);
        assert_eq!(decoder.drain_messages(), vec![msg]);
    }

    #[test]
    fn decodes_across_arbitrary_chunk_boundary() {
        let msg = json!({"seq": 2, "type": "response", "body": {"threads": []}});
        let bytes = encode(&msg);
        for split in 0..bytes.len() {
            let mut decoder = DapFrameDecoder::new();
            decoder.push(&bytes[..split]);
            let mut messages = decoder.drain_messages();
            decoder.push(&bytes[split..]);
            messages.extend(decoder.drain_messages());
            assert_eq!(messages, vec![msg.clone()], "failed at split {split}");
        }
    }

    #[test]
    fn decodes_multiple_messages_in_one_chunk() {
        let a = json!({"seq": 1});
        let b = json!({"seq": 2});
        let mut bytes = encode(&a);
        bytes.extend_from_slice(&encode(&b));

        let mut decoder = DapFrameDecoder::new();
        decoder.push(&bytes);
        assert_eq!(decoder.drain_messages(), vec![a, b]);
    }

    #[test]
    fn recovers_after_invalid_content_length() {
        let mut bytes = b"Content-Length: nope\r\n\r\n".to_vec();
        let good = json!({"seq": 3});
        bytes.extend_from_slice(&encode(&good));

        let mut decoder = DapFrameDecoder::new();
        decoder.push(&bytes);
        assert_eq!(decoder.drain_messages(), vec![good]);
    }
}
