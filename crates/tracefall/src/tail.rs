use anyhow::Context;
use tracefall_core::model::span::SimplifiedSpan;
use tracefall_relay::push::EVENT_NAME;

use crate::output::print_batch_human;

pub async fn run_tail(addr: String, json: bool) -> anyhow::Result<()> {
    let url = format!("http://{addr}/events");
    let client = reqwest::Client::new();
    let mut response = client
        .get(url)
        .send()
        .await
        .context("open relay event stream")?;

    if !response.status().is_success() {
        anyhow::bail!(
            "event stream request failed with status {}",
            response.status()
        );
    }

    let mut frames = FrameBuffer::default();
    while let Some(chunk) = response.chunk().await.context("read event stream chunk")? {
        frames.push(&chunk);

        while let Some(frame) = frames.next_frame() {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping event with invalid utf8");
                    continue;
                }
            };
            let Some(data) = message_data(&frame) else {
                continue;
            };
            if json {
                println!("{data}");
                continue;
            }
            match serde_json::from_str::<Vec<SimplifiedSpan>>(&data) {
                Ok(batch) => print_batch_human(&batch),
                Err(e) => tracing::warn!(error = %e, "skipping undecodable batch"),
            }
        }
    }

    Ok(())
}

/// Accumulates raw stream bytes and yields complete `\n\n`-terminated
/// frames. Text is decoded per frame, so a chunk may end mid-character.
#[derive(Default)]
struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    fn next_frame(&mut self) -> Option<Result<String, std::string::FromUtf8Error>> {
        let end = self.buf.windows(2).position(|w| w == b"\n\n")?;
        let frame: Vec<u8> = self.buf.drain(..end + 2).take(end).collect();
        Some(String::from_utf8(frame))
    }
}

/// Data of a `message` event, or `None` for keep-alives and other events.
pub fn message_data(frame: &str) -> Option<String> {
    let mut event = None;
    let mut data = Vec::new();
    for line in frame.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data.is_empty() || event.is_some_and(|e| e != EVENT_NAME) {
        return None;
    }
    Some(data.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_event_data() {
        let frame = "event: message\ndata: [{\"spanId\":\"a\"}]";
        assert_eq!(message_data(frame).as_deref(), Some("[{\"spanId\":\"a\"}]"));
    }

    #[test]
    fn joins_multi_line_data() {
        let frame = "event: message\ndata: [\ndata: 1]";
        assert_eq!(message_data(frame).as_deref(), Some("[\n1]"));
    }

    #[test]
    fn frame_split_inside_a_character_decodes_whole() {
        let frame = "event: message\ndata: [{\"endPoint\":\"https://café.example.com\"}]\n\n";
        let bytes = frame.as_bytes();
        let split = frame.find('é').unwrap() + 1;

        let mut frames = FrameBuffer::default();
        frames.push(&bytes[..split]);
        assert!(frames.next_frame().is_none());
        frames.push(&bytes[split..]);

        let decoded = frames.next_frame().unwrap().unwrap();
        assert_eq!(
            message_data(&decoded).as_deref(),
            Some("[{\"endPoint\":\"https://café.example.com\"}]")
        );
        assert!(frames.next_frame().is_none());
    }

    #[test]
    fn frames_are_yielded_in_order() {
        let mut frames = FrameBuffer::default();
        frames.push(b":\n\nevent: message\ndata: [1]\n\nevent: mess");
        assert_eq!(frames.next_frame().unwrap().unwrap(), ":");
        assert_eq!(frames.next_frame().unwrap().unwrap(), "event: message\ndata: [1]");
        assert!(frames.next_frame().is_none());
        frames.push(b"age\ndata: [2]\n\n");
        assert_eq!(
            message_data(&frames.next_frame().unwrap().unwrap()).as_deref(),
            Some("[2]")
        );
    }

    #[test]
    fn skips_keep_alive_and_foreign_events() {
        assert_eq!(message_data(":"), None);
        assert_eq!(message_data("event: terminate\ndata: bye"), None);
    }
}
