//! Integration tests for the IMAP engine.
//!
//! These drive the full session stack against a scripted duplex stream:
//! each script step releases its response only once the expected command
//! bytes have been written, so request/response pacing (including literal
//! continuations) is verified structurally, without a real server.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailweave_imap::folder::CollectingObserver;
use mailweave_imap::protocol::EngineEvent;
use mailweave_imap::{
    Capability, Command, Config, Engine, FetchAttribute, FetchRequest, Flag, FolderAccess,
    FolderEvent, FolderRegistry, IdleEvent, ModSeq, SearchQuery, SequenceSet, Session,
    StoreFlagsRequest, StoreMode, SyncState, ThreadingAlgorithm, Uid, UidSet, UidValidity,
};

/// One step of the server script: respond with `data` once `expect`
/// appears in the written bytes (`None` responds immediately).
struct Step {
    expect: Option<&'static [u8]>,
    data: &'static [u8],
}

struct Inner {
    steps: VecDeque<Step>,
    readable: Vec<u8>,
    written: Vec<u8>,
    read_waker: Option<Waker>,
}

impl Inner {
    fn release_ready(&mut self) {
        while let Some(step) = self.steps.front() {
            let ready = match step.expect {
                None => true,
                Some(pattern) => contains(&self.written, pattern),
            };
            if !ready {
                break;
            }
            let step = self.steps.pop_front().unwrap();
            self.readable.extend_from_slice(step.data);
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Scripted duplex stream shared with the test for write inspection.
#[derive(Clone)]
struct ScriptedStream {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedStream {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                steps: steps.into(),
                readable: Vec::new(),
                written: Vec::new(),
                read_waker: None,
            })),
        }
    }

    fn written(&self) -> Vec<u8> {
        self.inner.lock().unwrap().written.clone()
    }

    fn wrote(&self, pattern: &[u8]) -> bool {
        contains(&self.written(), pattern)
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut inner = self.inner.lock().unwrap();
        inner.release_ready();

        if inner.readable.is_empty() {
            inner.read_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let n = inner.readable.len().min(buf.remaining());
        let chunk: Vec<u8> = inner.readable.drain(..n).collect();
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut inner = self.inner.lock().unwrap();
        inner.written.extend_from_slice(buf);
        inner.release_ready();
        if let Some(waker) = inner.read_waker.take() {
            waker.wake();
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn config() -> Config {
    Config::builder("test.example.com")
        .io_timeout(Duration::from_secs(5))
        .build()
}

async fn session_for(steps: Vec<Step>) -> (Session<ScriptedStream>, ScriptedStream) {
    let stream = ScriptedStream::new(steps);
    let session = Session::from_stream(stream.clone(), config()).await.unwrap();
    (session, stream)
}

fn uid(n: u32) -> Uid {
    Uid::new(n).unwrap()
}

// === Scenario 1: open + fetch flags ===

#[tokio::test]
async fn open_and_fetch_flags() {
    let (mut session, stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1] Logged in\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 3 EXISTS\r\n\
                    * 0 RECENT\r\n\
                    * OK [UIDVALIDITY 1234] UIDs valid\r\n\
                    * OK [UIDNEXT 10] next\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
        Step {
            expect: Some(b"FETCH 1:3"),
            data: b"* 1 FETCH (UID 4 FLAGS (\\Seen))\r\n\
                    * 2 FETCH (UID 6 FLAGS ())\r\n\
                    * 3 FETCH (UID 9 FLAGS (\\Answered))\r\n\
                    A0003 OK Fetch completed\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    let access = session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();
    assert_eq!(access, FolderAccess::ReadWrite);

    let folder = session.folder("INBOX").unwrap();
    assert_eq!(folder.count(), 3);
    assert_eq!(folder.uid_validity(), UidValidity::new(1234));
    assert_eq!(folder.uid_next(), Uid::new(10));

    let summaries = session
        .fetch_range(1, 3, &FetchRequest::flags_only())
        .await
        .unwrap();
    assert_eq!(summaries.len(), 3);
    assert!(summaries[0].flags.as_ref().unwrap().is_seen());
    assert_eq!(summaries[2].uid(), Uid::new(9));
    // Results carry the folder validity
    assert_eq!(summaries[0].id.unwrap().validity.get(), 1234);

    assert!(stream.wrote(b"A0003 FETCH 1:3 (UID FLAGS)\r\n"));
}

// === Scenario 2: QRESYNC resynchronization ===

#[tokio::test]
async fn qresync_resynchronization_event_order() {
    let (mut session, _stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1 ENABLE CONDSTORE QRESYNC] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1 ENABLE CONDSTORE QRESYNC] done\r\n",
        },
        Step {
            expect: Some(b"ENABLE QRESYNC"),
            data: b"* ENABLED QRESYNC\r\nA0002 OK enabled\r\n",
        },
        Step {
            expect: Some(b"QRESYNC (1234 500 1:10)"),
            data: b"* VANISHED (EARLIER) 3,7\r\n\
                    * 1 FETCH (UID 1 FLAGS (\\Seen) MODSEQ (600))\r\n\
                    * 11 EXISTS\r\n\
                    * OK [UIDVALIDITY 1234] ok\r\n\
                    * OK [HIGHESTMODSEQ 700] ok\r\n\
                    A0003 OK [READ-WRITE] Selected\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    session.enable(&[Capability::QResync]).await.unwrap();

    let observer = CollectingObserver::new();
    let events = observer.handle();
    session.add_observer("INBOX", Box::new(observer));

    let state = SyncState::new(
        UidValidity::new(1234).unwrap(),
        ModSeq::from_u64(500).unwrap(),
    )
    .with_known_uids(UidSet::range(uid(1), uid(10)));

    session
        .open("INBOX", FolderAccess::ReadWrite, Some(&state))
        .await
        .unwrap();

    let recorded: Vec<FolderEvent> = events.take().into_iter().map(|(_, e)| e).collect();

    let vanished_at = recorded
        .iter()
        .position(|e| {
            matches!(e, FolderEvent::MessagesVanished { uids, earlier: true }
                if *uids == vec![uid(3), uid(7)])
        })
        .unwrap();
    let flags_at = recorded
        .iter()
        .position(|e| {
            matches!(e, FolderEvent::MessageFlagsChanged { uid: Some(u), flags, mod_seq: Some(m), .. }
                if u.get() == 1 && flags.is_seen() && m.get() == 600)
        })
        .unwrap();
    let count_at = recorded
        .iter()
        .position(|e| matches!(e, FolderEvent::CountChanged(11)))
        .unwrap();

    assert!(vanished_at < flags_at);
    assert!(flags_at < count_at);

    assert_eq!(session.folder("INBOX").unwrap().count(), 11);
    assert_eq!(
        session.folder("INBOX").unwrap().highest_mod_seq(),
        ModSeq::from_u64(700)
    );
}

// === Scenario 3: conditional STORE with mod-sequence conflict ===

#[tokio::test]
async fn conditional_store_reports_modified() {
    let (mut session, stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1 CONDSTORE] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1 CONDSTORE] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 6 EXISTS\r\n\
                    * OK [UIDVALIDITY 99] ok\r\n\
                    * OK [HIGHESTMODSEQ 700] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
        Step {
            expect: Some(b"UID STORE 5:6 (UNCHANGEDSINCE 700) +FLAGS (\\Deleted)"),
            data: b"* 5 FETCH (UID 5 MODSEQ (701))\r\n\
                    A0003 OK [MODIFIED 5] Conditional STORE failed\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let observer = CollectingObserver::new();
    let events = observer.handle();
    session.add_observer("INBOX", Box::new(observer));

    let request = StoreFlagsRequest::new(StoreMode::Add, vec![Flag::Deleted])
        .unchanged_since(ModSeq::from_u64(700).unwrap());
    let not_updated = session.store_flags(&[uid(5), uid(6)], &request).await.unwrap();

    assert_eq!(not_updated, vec![uid(5)]);
    assert!(stream.wrote(b"UID STORE 5:6 (UNCHANGEDSINCE 700) +FLAGS (\\Deleted)\r\n"));

    // The skipped message produced a mod-seq bump, not a flags change
    let recorded: Vec<FolderEvent> = events.take().into_iter().map(|(_, e)| e).collect();
    assert!(!recorded
        .iter()
        .any(|e| matches!(e, FolderEvent::MessageFlagsChanged { uid: Some(u), .. } if u.get() == 5)));
    assert!(recorded
        .iter()
        .any(|e| matches!(e, FolderEvent::ModSeqChanged { uid: Some(u), mod_seq, .. }
            if u.get() == 5 && mod_seq.get() == 701)));
}

// === Scenario 4: UIDVALIDITY change across a reopen ===

#[tokio::test]
async fn uidvalidity_change_on_reopen_discards_cache() {
    let (mut session, _stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1] done\r\n",
        },
        Step {
            expect: Some(b"A0002 SELECT"),
            data: b"* 5 EXISTS\r\n\
                    * OK [UIDVALIDITY 1234] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
        Step {
            expect: Some(b"A0003 SELECT"),
            data: b"* 2 EXISTS\r\n\
                    * OK [UIDVALIDITY 9999] ok\r\n\
                    A0003 OK [READ-WRITE] Selected\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();

    let observer = CollectingObserver::new();
    let events = observer.handle();
    session.add_observer("INBOX", Box::new(observer));

    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();
    let _ = events.take();

    // Reopen; the mailbox was rebuilt in between
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let recorded: Vec<FolderEvent> = events.take().into_iter().map(|(_, e)| e).collect();
    let changed_at = recorded
        .iter()
        .position(|e| matches!(e, FolderEvent::UidValidityChanged(v) if v.get() == 9999))
        .unwrap();
    let discard_at = recorded
        .iter()
        .position(|e| matches!(e, FolderEvent::DiscardCache))
        .unwrap();
    assert_eq!(discard_at, changed_at + 1);

    assert_eq!(
        session.folder("INBOX").unwrap().uid_validity(),
        UidValidity::new(9999)
    );
}

// === Scenario 5: IDLE + cancellation; FETCH + cancellation ===

#[tokio::test]
async fn idle_cancellation_sends_done_and_stays_selected() {
    let token = tokio_util::sync::CancellationToken::new();
    let stream = ScriptedStream::new(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1 IDLE] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 1 EXISTS\r\n\
                    * OK [UIDVALIDITY 7] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
        Step {
            expect: Some(b"IDLE"),
            data: b"+ idling\r\n",
        },
        Step {
            expect: Some(b"DONE"),
            data: b"A0003 OK IDLE terminated\r\n",
        },
    ]);
    let config = Config::builder("test.example.com")
        .io_timeout(Duration::from_secs(5))
        .cancellation(token.clone())
        .build();
    let mut session = Session::from_stream(stream.clone(), config).await.unwrap();

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let mut handle = session.idle().await.unwrap();
    // Cancel while idling; DONE must be sent and the completion awaited
    token.cancel();
    let event = handle.wait(Duration::from_secs(30)).await.unwrap();
    assert_eq!(event, IdleEvent::Cancelled);

    assert!(stream.wrote(b"DONE\r\n"));
    assert!(session.state().is_selected());
}

#[tokio::test]
async fn fetch_cancellation_disconnects() {
    let token = tokio_util::sync::CancellationToken::new();
    let stream = ScriptedStream::new(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 4 EXISTS\r\n\
                    * OK [UIDVALIDITY 7] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
        // No response is scripted for the FETCH; the cancellation lands
        // while the engine is awaiting it
    ]);
    let config = Config::builder("test.example.com")
        .io_timeout(Duration::from_secs(30))
        .cancellation(token.clone())
        .build();
    let mut session = Session::from_stream(stream, config).await.unwrap();

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = session
        .fetch_range(1, -1, &FetchRequest::flags_only())
        .await
        .unwrap_err();
    assert!(matches!(err, mailweave_imap::Error::Cancelled));
    assert!(!session.state().is_usable());
}

// === Scenario 6: pipelined NOOP + FETCH with interleaved EXISTS ===

#[test]
fn pipelined_commands_apply_updates_before_completions() {
    let mut engine = Engine::new();
    engine.connect_started();

    let mut registry = FolderRegistry::new();
    registry.upsert_list(&mailweave_imap::types::ListResponse {
        attributes: vec![],
        delimiter: Some('/'),
        mailbox: mailweave_imap::Mailbox::inbox(),
    });

    let observer = CollectingObserver::new();
    let events = observer.handle();
    registry.get_mut("INBOX").unwrap().add_observer(Box::new(observer));

    engine
        .handle_response(b"* OK [CAPABILITY IMAP4rev1] ready\r\n", &mut registry)
        .unwrap();
    registry.begin_open("INBOX");
    registry.complete_open(FolderAccess::ReadWrite).unwrap();
    let _ = events.take();

    // Two tagged commands written back-to-back
    let noop = engine.queue(&Command::Noop).unwrap();
    let fetch = engine
        .queue(&Command::Fetch {
            set: SequenceSet::All,
            uid: false,
            attributes: vec![FetchAttribute::Flags],
            changed_since: None,
        })
        .unwrap();
    assert!(engine.poll_transmit().is_some());
    assert!(engine.poll_transmit().is_some());

    // The server interleaves an EXISTS between the completions
    let mut completions = Vec::new();
    let mut count_changed_seen_before_completion = false;

    for response in [
        b"* 4 EXISTS\r\n".to_vec(),
        format!("{} OK NOOP done\r\n", noop.tag()).into_bytes(),
        format!("{} OK FETCH done\r\n", fetch.tag()).into_bytes(),
    ] {
        let produced = engine.handle_response(&response, &mut registry).unwrap();
        for event in produced {
            if let EngineEvent::CommandComplete { handle, .. } = event {
                if completions.is_empty() {
                    // Before the first completion surfaced, observers must
                    // already have seen the count change
                    count_changed_seen_before_completion = events
                        .snapshot()
                        .iter()
                        .any(|(_, e)| matches!(e, FolderEvent::CountChanged(4)));
                }
                completions.push(handle);
            }
        }
    }

    assert!(count_changed_seen_before_completion);
    assert_eq!(completions, vec![noop, fetch]);
    assert_eq!(registry.get("INBOX").unwrap().count(), 4);
}

// === Boundary behaviors ===

#[tokio::test]
async fn fetch_on_empty_folder_is_a_local_noop() {
    let (mut session, stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 0 EXISTS\r\n\
                    * OK [UIDVALIDITY 7] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let summaries = session
        .fetch_range(1, -1, &FetchRequest::metadata())
        .await
        .unwrap();
    assert!(summaries.is_empty());
    assert!(!stream.wrote(b"A0003"));
}

#[tokio::test]
async fn copy_and_move_of_empty_set_never_touch_the_wire() {
    let (mut session, stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1 MOVE] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1 MOVE] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 1 EXISTS\r\n\
                    * OK [UIDVALIDITY 7] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let copied = session.copy_to(&[], "Archive").await.unwrap();
    assert!(copied.is_empty());
    let moved = session.move_to(&[], "Archive").await.unwrap();
    assert!(moved.is_empty());

    assert!(!stream.wrote(b"COPY"));
    assert!(!stream.wrote(b"MOVE"));
}

#[tokio::test]
async fn copy_returns_uid_mapping() {
    let (mut session, _stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1 UIDPLUS] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1 UIDPLUS] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 3 EXISTS\r\n\
                    * OK [UIDVALIDITY 1] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
        Step {
            expect: Some(b"UID COPY 304,319:320 Archive"),
            data: b"A0003 OK [COPYUID 38505 304,319:320 3956:3958] Done\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let map = session
        .copy_to(&[uid(304), uid(319), uid(320)], "Archive")
        .await
        .unwrap();
    assert_eq!(map.len(), 3);
    let dest = map.destination_of(uid(319)).unwrap();
    assert_eq!(dest.validity.get(), 38505);
    assert_eq!(dest.uid.get(), 3957);
}

#[tokio::test]
async fn append_paces_literal_and_returns_appenduid() {
    let (mut session, stream) = session_for(vec![
        Step {
            expect: None,
            // No LITERAL+: the payload must wait for the continuation
            data: b"* OK [CAPABILITY IMAP4rev1 UIDPLUS] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1 UIDPLUS] done\r\n",
        },
        Step {
            expect: Some(b"{16}"),
            data: b"+ Ready for literal\r\n",
        },
        Step {
            expect: Some(b"From: me"),
            data: b"A0002 OK [APPENDUID 1234 101] Append completed\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();

    let request = mailweave_imap::AppendRequest::new(b"From: me\r\n\r\nbody".to_vec())
        .with_flag(Flag::Seen);
    let assigned = session.append("Drafts", &[request]).await.unwrap();

    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].uid.get(), 101);
    assert_eq!(assigned[0].validity.get(), 1234);
    assert!(stream.wrote(b"A0002 APPEND Drafts (\\Seen) {16}\r\n"));
}

#[tokio::test]
async fn search_results_are_validity_qualified() {
    let (mut session, _stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 9 EXISTS\r\n\
                    * OK [UIDVALIDITY 77] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
        Step {
            expect: Some(b"UID SEARCH UNSEEN"),
            data: b"* SEARCH 2 5 8\r\nA0003 OK done\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let results = session.search(&SearchQuery::Unseen, None).await.unwrap();
    assert_eq!(results.uids(), vec![uid(2), uid(5), uid(8)]);
    assert!(results.ids.iter().all(|id| id.validity.get() == 77));
}

#[tokio::test]
async fn thread_algorithm_verified_client_side() {
    let (mut session, stream) = session_for(vec![
        Step {
            expect: None,
            // Server only offers ORDEREDSUBJECT
            data: b"* OK [CAPABILITY IMAP4rev1 THREAD=ORDEREDSUBJECT] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1 THREAD=ORDEREDSUBJECT] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 5 EXISTS\r\n\
                    * OK [UIDVALIDITY 7] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
        Step {
            expect: Some(b"UID THREAD ORDEREDSUBJECT"),
            data: b"* THREAD (2)(3 6 (4 23)(44 7 96))\r\nA0003 OK done\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    // REFERENCES is not advertised: fail before any wire traffic
    let err = session
        .thread(ThreadingAlgorithm::References, &SearchQuery::All)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        mailweave_imap::Error::CapabilityUnavailable(_)
    ));
    assert!(!stream.wrote(b"REFERENCES"));

    let threads = session
        .thread(ThreadingAlgorithm::OrderedSubject, &SearchQuery::All)
        .await
        .unwrap();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0].ids()[0].uid.get(), 2);
    assert_eq!(threads[1].len(), 7);
}

#[tokio::test]
async fn store_on_read_only_folder_fails_client_side() {
    let (mut session, stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1] done\r\n",
        },
        Step {
            expect: Some(b"EXAMINE"),
            data: b"* 5 EXISTS\r\n\
                    * OK [UIDVALIDITY 7] ok\r\n\
                    A0002 OK [READ-ONLY] Examined\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    let access = session
        .open("INBOX", FolderAccess::ReadOnly, None)
        .await
        .unwrap();
    assert_eq!(access, FolderAccess::ReadOnly);

    let request = StoreFlagsRequest::new(StoreMode::Add, vec![Flag::Deleted]);
    let err = session.store_flags(&[uid(1)], &request).await.unwrap_err();
    assert!(matches!(err, mailweave_imap::Error::InvalidState(_)));
    assert!(!stream.wrote(b"STORE"));
}

#[tokio::test]
async fn move_without_capability_fails_client_side() {
    let (mut session, stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 1 EXISTS\r\n\
                    * OK [UIDVALIDITY 7] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let err = session.move_to(&[uid(1)], "Archive").await.unwrap_err();
    assert!(matches!(
        err,
        mailweave_imap::Error::CapabilityUnavailable(_)
    ));
    assert!(!stream.wrote(b"MOVE"));
}

#[tokio::test]
async fn tagged_no_keeps_session_usable() {
    let (mut session, _stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1] done\r\n",
        },
        Step {
            expect: Some(b"A0002 SELECT"),
            data: b"A0002 NO no such mailbox\r\n",
        },
        Step {
            expect: Some(b"A0003 SELECT"),
            data: b"* 1 EXISTS\r\n\
                    * OK [UIDVALIDITY 7] ok\r\n\
                    A0003 OK [READ-WRITE] Selected\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();

    let err = session
        .open("Missing", FolderAccess::ReadWrite, None)
        .await
        .unwrap_err();
    assert!(matches!(err, mailweave_imap::Error::No { .. }));
    assert!(session.state().is_usable());

    // The session is still fully functional
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();
    assert!(session.state().is_selected());
}

#[tokio::test]
async fn status_on_selected_folder_is_rejected() {
    let (mut session, stream) = session_for(vec![
        Step {
            expect: None,
            data: b"* OK [CAPABILITY IMAP4rev1] ready\r\n",
        },
        Step {
            expect: Some(b"LOGIN"),
            data: b"A0001 OK [CAPABILITY IMAP4rev1] done\r\n",
        },
        Step {
            expect: Some(b"SELECT"),
            data: b"* 1 EXISTS\r\n\
                    * OK [UIDVALIDITY 7] ok\r\n\
                    A0002 OK [READ-WRITE] Selected\r\n",
        },
    ])
    .await;

    session.login("user", "pass").await.unwrap();
    session
        .open("INBOX", FolderAccess::ReadWrite, None)
        .await
        .unwrap();

    let err = session.status("INBOX", &[]).await.unwrap_err();
    assert!(matches!(err, mailweave_imap::Error::InvalidState(_)));
    assert!(!stream.wrote(b"STATUS"));
}
