//! Text retrieval pages and continuation controls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use dejavu_db::test_fixtures::{unit_vector, vector_with_similarity};
use dejavu_db::InMemoryStore;
use dejavu_inference::mock::{MockEmbedder, MockKeyframeExtractor};
use dejavu_media::defaults::{CALLBACK_DATA_MAX_BYTES, MAX_CONTINUATION_OFFSET};
use dejavu_media::replies;
use dejavu_media::testing::{MemoryDownloader, RecordingTransport, ScriptedHistory};
use dejavu_media::{
    ChatEvent, Collaborators, Continuation, Error, EventOutcome, FrameEmbedding, MediaConfig,
    MediaEmbeddingRepository, MediaEngine, MediaStore, MediaType, PassthroughTranslator,
    QueryTranslator, ReplyTarget, Result, RetrievalOutcome,
};

const CHAT: i64 = -1005550001111;
const COMMAND_MESSAGE: i64 = 500;

/// Too long to fit a callback payload inline.
const LONG_QUERY: &str = "червона машина біля синього будинку вночі";

struct Ukrainian;

#[async_trait]
impl QueryTranslator for Ukrainian {
    async fn translate(&self, text: &str) -> Result<String> {
        match text {
            "червона машина" => Ok("red car".to_string()),
            other => Ok(other.to_string()),
        }
    }
}

struct Setup {
    transport: RecordingTransport,
    engine: MediaEngine,
}

/// Seven photos whose similarity to the "red car" query falls from 0.90 to 0.60.
async fn setup_with(translator: Arc<dyn QueryTranslator>) -> Setup {
    let store = Arc::new(InMemoryStore::new());
    for message_id in 1..=7i64 {
        let similarity = 0.95 - 0.05 * message_id as f32;
        store
            .insert_frames(
                CHAT,
                message_id,
                MediaType::Photo,
                &[FrameEmbedding::new(
                    0,
                    vector_with_similarity(0, 10 + message_id as usize, similarity),
                )],
            )
            .await
            .unwrap();
    }

    let transport = RecordingTransport::new();
    let embedder = MockEmbedder::new()
        .with_text("red car", unit_vector(0))
        .with_text(LONG_QUERY, unit_vector(0))
        .with_text("blue whale", unit_vector(300))
        .with_failing_text("broken query");
    let engine = MediaEngine::new(
        MediaStore::in_memory(store),
        Collaborators {
            embedder: Arc::new(embedder),
            extractor: Arc::new(MockKeyframeExtractor::new()),
            translator,
            transport: Arc::new(transport.clone()),
            downloader: Arc::new(MemoryDownloader::new()),
            history: Arc::new(ScriptedHistory::new()),
        },
        MediaConfig::default().with_reply_delay(Duration::ZERO),
    );
    Setup { transport, engine }
}

async fn setup() -> Setup {
    setup_with(Arc::new(PassthroughTranslator)).await
}

fn search_event(query: Option<&str>) -> ChatEvent {
    ChatEvent::Command {
        chat_id: CHAT,
        message_id: COMMAND_MESSAGE,
        name: "searchmedia".to_string(),
        args: query.map(str::to_string),
        reply_target: ReplyTarget::Missing,
    }
}

fn press(message_id: i64, payload: String) -> ChatEvent {
    ChatEvent::Callback {
        chat_id: CHAT,
        message_id,
        payload,
    }
}

async fn retrieve(setup: &Setup, event: ChatEvent) -> RetrievalOutcome {
    match setup.engine.handle(event).await.unwrap() {
        EventOutcome::Retrieval(outcome) => outcome,
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_first_page_has_header_and_more_control() {
    let setup = setup().await;

    let outcome = retrieve(&setup, search_event(Some("red car"))).await;

    assert_eq!(
        outcome,
        RetrievalOutcome::Page {
            offset: 0,
            matches: 3,
            has_more: true,
            delivered: 4
        }
    );
    let sent = setup.transport.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0].text, replies::RETRIEVAL_HEADER);
    assert_eq!(sent[0].reply_to, Some(COMMAND_MESSAGE));

    let targets: Vec<Option<i64>> = sent[1..].iter().map(|r| r.reply_to).collect();
    assert_eq!(targets, vec![Some(1), Some(2), Some(3)]);
    assert!(sent[1..].iter().all(|r| r.silent));
    assert_eq!(sent[1].text, "red car (0.9000)");

    assert!(sent[1].control.is_none());
    assert!(sent[2].control.is_none());
    let control = sent[3].control.as_ref().expect("last match carries the control");
    assert_eq!(control.label, replies::RETRIEVAL_MORE_LABEL);
    assert_eq!(
        Continuation::decode(&control.payload).unwrap(),
        Continuation::new("red car", 3)
    );
}

#[tokio::test]
async fn test_continuations_walk_to_the_end() {
    let setup = setup().await;
    retrieve(&setup, search_event(Some("red car"))).await;

    let second = Continuation::new("red car", 3).encode().unwrap();
    let outcome = retrieve(
        &setup,
        ChatEvent::Callback {
            chat_id: CHAT,
            message_id: 9001,
            payload: second,
        },
    )
    .await;
    assert_eq!(
        outcome,
        RetrievalOutcome::Page {
            offset: 3,
            matches: 3,
            has_more: true,
            delivered: 3
        }
    );
    assert_eq!(setup.transport.cleared(), vec![(CHAT, 9001)]);

    let third = Continuation::new("red car", 6).encode().unwrap();
    let outcome = retrieve(
        &setup,
        ChatEvent::Callback {
            chat_id: CHAT,
            message_id: 9002,
            payload: third,
        },
    )
    .await;
    assert!(matches!(
        outcome,
        RetrievalOutcome::Page {
            matches: 1,
            has_more: false,
            ..
        }
    ));

    let sent = setup.transport.sent();
    let targets: Vec<i64> = sent.iter().filter_map(|r| r.reply_to).collect();
    assert_eq!(targets, vec![COMMAND_MESSAGE, 1, 2, 3, 4, 5, 6, 7]);
    let last = sent.last().unwrap();
    assert_eq!(last.text, replies::RETRIEVAL_END);
    assert!(last.control.is_none());
    assert!(sent.iter().filter(|r| r.text == replies::RETRIEVAL_HEADER).count() == 1);
}

#[tokio::test]
async fn test_nothing_found_replies_once() {
    let setup = setup().await;

    let outcome = retrieve(&setup, search_event(Some("blue whale"))).await;

    assert!(matches!(
        outcome,
        RetrievalOutcome::Page {
            matches: 0,
            has_more: false,
            ..
        }
    ));
    let sent = setup.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, replies::RETRIEVAL_NOTHING_FOUND);
    assert_eq!(sent[0].reply_to, Some(COMMAND_MESSAGE));
}

#[tokio::test]
async fn test_empty_continuation_says_thats_all() {
    let setup = setup().await;
    let payload = Continuation::new("red car", 30).encode().unwrap();

    retrieve(
        &setup,
        ChatEvent::Callback {
            chat_id: CHAT,
            message_id: 9003,
            payload,
        },
    )
    .await;

    assert_eq!(setup.transport.texts(), vec![replies::RETRIEVAL_END]);
}

#[tokio::test]
async fn test_missing_query_gets_usage_hint() {
    let setup = setup().await;

    assert_eq!(
        retrieve(&setup, search_event(None)).await,
        RetrievalOutcome::Usage
    );
    assert_eq!(
        retrieve(&setup, search_event(Some("   "))).await,
        RetrievalOutcome::Usage
    );
    assert!(setup
        .transport
        .texts()
        .iter()
        .all(|t| t.contains("/searchmedia")));
}

#[tokio::test]
async fn test_failed_match_reply_does_not_stop_the_page() {
    let setup = setup().await;
    setup.transport.fail_replies_to(2);

    let outcome = retrieve(&setup, search_event(Some("red car"))).await;

    assert!(matches!(outcome, RetrievalOutcome::Page { delivered: 3, .. }));
    let targets: Vec<Option<i64>> = setup.transport.sent().iter().map(|r| r.reply_to).collect();
    assert_eq!(targets, vec![Some(COMMAND_MESSAGE), Some(1), Some(3)]);
}

#[tokio::test]
async fn test_non_latin_query_is_translated_but_rendered_as_typed() {
    let setup = setup_with(Arc::new(Ukrainian)).await;

    retrieve(&setup, search_event(Some("червона машина"))).await;

    let sent = setup.transport.sent();
    assert_eq!(sent[1].text, "червона машина (0.9000)");
    let payload = &sent[3].control.as_ref().unwrap().payload;
    assert!(Continuation::decode(payload)
        .unwrap()
        .query
        .starts_with("червона"));
}

#[tokio::test]
async fn test_malformed_continuation_is_rejected() {
    let setup = setup().await;

    let result = setup
        .engine
        .handle(ChatEvent::Callback {
            chat_id: CHAT,
            message_id: 1,
            payload: "islm-{broken".to_string(),
        })
        .await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(setup.transport.sent().is_empty());
    assert!(setup.transport.cleared().is_empty());
}

#[tokio::test]
async fn test_foreign_callbacks_are_not_handled() {
    let setup = setup().await;

    let outcome = setup
        .engine
        .handle(ChatEvent::Callback {
            chat_id: CHAT,
            message_id: 1,
            payload: "poll-42".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Unhandled);
}

#[tokio::test]
async fn test_long_query_pages_keep_the_full_query() {
    let setup = setup().await;
    retrieve(&setup, search_event(Some(LONG_QUERY))).await;

    let first = setup.transport.sent();
    let payload = first[3].control.as_ref().unwrap().payload.clone();
    assert!(payload.len() <= CALLBACK_DATA_MAX_BYTES);
    assert!(!payload.contains("червона"));
    assert_eq!(setup.engine.retrieval().continuations().len(), 1);

    let outcome = retrieve(&setup, press(9001, payload)).await;
    assert!(matches!(
        outcome,
        RetrievalOutcome::Page {
            offset: 3,
            matches: 3,
            has_more: true,
            ..
        }
    ));

    let second = &setup.transport.sent()[first.len()..];
    let targets: Vec<Option<i64>> = second.iter().map(|r| r.reply_to).collect();
    assert_eq!(targets, vec![Some(4), Some(5), Some(6)]);
    let expected = format!("{} (", LONG_QUERY);
    assert!(second.iter().all(|r| r.text.starts_with(&expected)));

    let third = second[2].control.as_ref().unwrap().payload.clone();
    retrieve(&setup, press(9002, third)).await;
    let all = setup.transport.sent();
    assert_eq!(all[all.len() - 2].reply_to, Some(7));
    assert!(all[all.len() - 2].text.starts_with(&expected));
    assert_eq!(all.last().unwrap().text, replies::RETRIEVAL_END);
}

#[tokio::test]
async fn test_forgotten_long_query_asks_to_search_again() {
    let setup = setup().await;

    let outcome = retrieve(
        &setup,
        press(9004, r#"islm-{"k":"0123456789abcdef","o":3}"#.to_string()),
    )
    .await;

    assert_eq!(outcome, RetrievalOutcome::Expired);
    let sent = setup.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, replies::RETRIEVAL_EXPIRED);
    assert_eq!(sent[0].reply_to, Some(9004));
    assert_eq!(setup.transport.cleared(), vec![(CHAT, 9004)]);
}

#[tokio::test]
async fn test_out_of_range_offsets_are_rejected() {
    let setup = setup().await;

    for offset in [MAX_CONTINUATION_OFFSET + 1, i64::MAX - 1, i64::MAX] {
        let payload = format!(r#"islm-{{"t":"red car","o":{}}}"#, offset);
        let result = setup.engine.handle(press(9005, payload)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))), "offset {}", offset);
    }
    assert!(setup.transport.sent().is_empty());
    assert!(setup.transport.cleared().is_empty());

    let edge = format!(r#"islm-{{"t":"red car","o":{}}}"#, MAX_CONTINUATION_OFFSET);
    let outcome = retrieve(&setup, press(9006, edge)).await;
    assert!(matches!(
        outcome,
        RetrievalOutcome::Page {
            matches: 0,
            has_more: false,
            ..
        }
    ));
    assert_eq!(setup.transport.texts(), vec![replies::RETRIEVAL_END]);
}

#[tokio::test]
async fn test_failed_search_is_reported_to_the_requester() {
    let setup = setup().await;

    let outcome = retrieve(&setup, search_event(Some("broken query"))).await;

    assert_eq!(outcome, RetrievalOutcome::Failed);
    let sent = setup.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, replies::RETRIEVAL_FAILED);
    assert_eq!(sent[0].reply_to, Some(COMMAND_MESSAGE));
}

#[tokio::test]
async fn test_failed_continuation_keeps_the_control() {
    let setup = setup().await;
    let payload = Continuation::new("broken query", 3).encode().unwrap();

    let outcome = retrieve(&setup, press(9007, payload)).await;

    assert_eq!(outcome, RetrievalOutcome::Failed);
    assert_eq!(setup.transport.texts(), vec![replies::RETRIEVAL_FAILED]);
    assert_eq!(setup.transport.sent()[0].reply_to, Some(9007));
    assert!(setup.transport.cleared().is_empty());
}
