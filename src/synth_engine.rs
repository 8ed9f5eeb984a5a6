//! The synthesizer engine (`EngineHost` capability set): owns one
//! background task and the registry of live
//! [`SynthSession`]s it dispatches task messages to. A plugin binary
//! creates one `SynthEngine` per loaded engine instance and calls
//! [`SynthEngine::create_channel`] once per MRCP channel the host opens.

use std::net::TcpStream;
use std::sync::Arc;

use vspeak_core::{ChannelHost, ChannelId, SynthRequest};
use vspeak_ws::WsClient;

use vspeak_session::task::{Envelope, Task, TaskHandler, TaskMessage, TaskSender};
use vspeak_session::SynthSession;

use crate::engine::ChannelIdAllocator;
use crate::params::EngineParams;
use crate::registry::ChannelRegistry;

type Session<H> = SynthSession<H, TcpStream>;

/// Routes queued [`TaskMessage`]s to the session they target ("the
/// task posts messages to itself for next-tick work"). A message whose
/// channel has already been destroyed is dropped — there is nothing left
/// to act on.
struct SynthTaskHandler<H: ChannelHost + 'static> {
    channels: Arc<ChannelRegistry<Session<H>>>,
}

impl<H: ChannelHost + 'static> TaskHandler<SynthRequest> for SynthTaskHandler<H> {
    fn handle(&mut self, envelope: Envelope<SynthRequest>, resubmit: &TaskSender<SynthRequest>) {
        let Some(session) = self.channels.get(envelope.channel) else {
            return;
        };
        match envelope.message {
            TaskMessage::OpenChannel => session.task_open_channel(),
            TaskMessage::CloseChannel => session.task_close_channel(),
            TaskMessage::SpeakStart(req) => session.task_speak_start(req, resubmit),
            TaskMessage::RecvPoll => session.task_recv_poll(resubmit),
            // The synthesizer never posts these; they're recognizer-only
            // variants of the shared `TaskMessage` enum.
            TaskMessage::RequestDispatch(_)
            | TaskMessage::SendAudioBatch
            | TaskMessage::StreamAudioChunk(_)
            | TaskMessage::RecvResult => {}
        }
    }
}

/// One running synthesizer engine instance.
pub struct SynthEngine<H: ChannelHost + 'static> {
    task: Task<SynthRequest>,
    channels: Arc<ChannelRegistry<Session<H>>>,
    ids: ChannelIdAllocator,
}

impl<H: ChannelHost + 'static> SynthEngine<H> {
    #[must_use]
    pub fn new() -> Self {
        let channels: Arc<ChannelRegistry<Session<H>>> = Arc::new(ChannelRegistry::new());
        let task = Task::spawn(SynthTaskHandler { channels: channels.clone() });
        Self { task, channels, ids: ChannelIdAllocator::new() }
    }

    /// `create_channel(engine, pool)`: allocates a new channel id, builds a
    /// not-yet-connected [`WsClient`] from `params.ws`, and registers the
    /// session. The WebSocket connection itself is opened lazily by the
    /// background task on the first `SPEAK` (`task_speak_start` calls
    /// `ensure_connected`).
    pub fn create_channel(&self, host: Arc<H>, params: &EngineParams) -> Arc<Session<H>> {
        let channel = self.ids.next();
        let ws = WsClient::new(params.ws.clone());
        let session = Arc::new(SynthSession::new(channel, host, ws, params.audio.capacity, self.task.sender()));
        self.channels.insert(channel, session.clone());
        session
    }

    /// `destroy(channel)`: drop the engine's reference to a channel the
    /// host has finished closing.
    pub fn destroy_channel(&self, channel: ChannelId) {
        self.channels.remove(channel);
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl<H: ChannelHost + 'static> Default for SynthEngine<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::time::Duration;

    use vspeak_core::{CompletionCause, HostMessage};

    #[derive(Default)]
    struct RecordingHost {
        messages: Mutex<Vec<HostMessage>>,
        open_ok: Mutex<Vec<bool>>,
    }

    impl ChannelHost for RecordingHost {
        fn open_respond(&self, ok: bool) {
            self.open_ok.lock().unwrap().push(ok);
        }
        fn close_respond(&self) {}
        fn message_send(&self, msg: HostMessage) {
            self.messages.lock().unwrap().push(msg);
        }
    }

    /// A minimal loopback TTS server: accepts one connection, answers the
    /// handshake, sends one BIN frame of `audio_len` zero bytes, then a
    /// TEXT completion marker.
    fn spawn_echo_tts_server(audio_len: usize) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
            }
            stream
                .write_all(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n")
                .unwrap();

            // Wait for the TTS request text frame before replying, same as
            // a real server would.
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);

            let audio = vspeak_ws::frame::encode(&vspeak_ws::Frame::binary(vec![0u8; audio_len]));
            stream.write_all(&audio).unwrap();
            let done = vspeak_ws::frame::encode(&vspeak_ws::Frame::text(br#"{"status":"complete"}"#.to_vec()));
            stream.write_all(&done).unwrap();
        });
        port
    }

    #[test]
    fn create_channel_registers_and_destroy_removes() {
        let engine: SynthEngine<RecordingHost> = SynthEngine::new();
        let host = Arc::new(RecordingHost::default());
        let params = EngineParams::synth_defaults();
        let session = engine.create_channel(host, &params);
        assert_eq!(engine.channel_count(), 1);
        engine.destroy_channel(session.channel());
        assert_eq!(engine.channel_count(), 0);
    }

    #[test]
    fn open_then_speak_drains_audio_and_completes() {
        let port = spawn_echo_tts_server(640);
        let engine: SynthEngine<RecordingHost> = SynthEngine::new();
        let host = Arc::new(RecordingHost::default());
        let mut params = EngineParams::synth_defaults();
        params.ws.host = "127.0.0.1".into();
        params.ws.port = port;

        let session = engine.create_channel(host.clone(), &params);
        session.open();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(host.open_ok.lock().unwrap(), &[true]);

        session.request(
            SynthRequest::Speak {
                text: "hi".into(),
                voice: None,
                speed: None,
                pitch: None,
                volume: None,
                session_id: Some("sid".into()),
            },
            vspeak_core::CodecDescriptor::pcm_8k(),
        );

        // Give the background task time to connect, send, and receive.
        std::thread::sleep(Duration::from_millis(300));

        let mut got_all = false;
        for _ in 0..4 {
            let frame = session.stream_read(320);
            if frame.iter().all(|b| *b == 0) {
                let messages = host.messages.lock().unwrap();
                if messages.iter().any(|m| matches!(m, HostMessage::SpeakComplete { cause: CompletionCause::Normal })) {
                    got_all = true;
                    break;
                }
            }
        }
        assert!(got_all, "expected SPEAK-COMPLETE(Normal) after draining audio");
    }
}
