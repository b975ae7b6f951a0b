use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use wastewise_core::{AnalysisMode, AnalysisResult, HistoryItem, Location, Settings, SyncStatus};

use super::{FixedProbe, IMAGE_KEY, harness, harness_with, wait_until};
use crate::{AnalyzeOutcome, NoticeKind, Probes, ValidationError};

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

#[tokio::test]
async fn offline_image_is_queued_without_remote_calls() {
    let mut h = harness(false).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap();

    let outcome = orchestrator.analyze().await;
    let AnalyzeOutcome::Queued { item_id } = outcome else {
        panic!("expected queued, got {outcome:?}");
    };

    let history = h.ctx.history.snapshot().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id(), item_id);
    assert_eq!(history[0].sync_status(), SyncStatus::Pending);
    assert!(history[0].result().is_none());
    let HistoryItem::Image(item) = &history[0] else { panic!("expected image item") };
    assert!(item.image_preview.starts_with("data:image/jpeg;base64,"));
    assert_eq!(item.mime_type, "image/jpeg");
    assert_eq!(h.llm.total_calls(), 0);
    assert!(h.notices().contains(&NoticeKind::OfflineQueued));
}

#[tokio::test]
async fn offline_text_query_is_queued_as_typed() {
    let h = harness(false).await;
    h.ctx.orchestrator.set_mode(AnalysisMode::Text);
    h.ctx.orchestrator.set_text_query("  where do batteries go?  ");

    assert!(matches!(h.ctx.orchestrator.analyze().await, AnalyzeOutcome::Queued { .. }));
    let history = h.ctx.history.snapshot().await;
    let HistoryItem::Text(item) = &history[0] else { panic!("expected text item") };
    assert_eq!(item.original_query, "  where do batteries go?  ");
    assert_eq!(h.llm.total_calls(), 0);
}

#[tokio::test]
async fn queuing_offline_clears_the_editor() {
    let mut h = harness(false).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.set_mode(AnalysisMode::Text);
    orchestrator.set_text_query("batteries");

    assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Queued { .. }));
    let editor = orchestrator.editor_snapshot();
    assert_eq!(editor.mode, AnalysisMode::Text);
    assert!(editor.text_query.is_empty());
    h.notices();

    assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Rejected(ValidationError::OfflineNoInput)));
    assert_eq!(h.ctx.history.len().await, 1);
    assert_eq!(h.notices(), vec![NoticeKind::OfflineNoInput]);
}

#[tokio::test]
async fn queued_image_is_not_queued_twice() {
    let h = harness(false).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap();

    assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Queued { .. }));
    assert!(orchestrator.editor_snapshot().image.is_none());
    assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Rejected(ValidationError::OfflineNoInput)));
    assert_eq!(h.ctx.history.len().await, 1);
}

#[tokio::test]
async fn offline_without_input_is_rejected() {
    let mut h = harness(false).await;
    let outcome = h.ctx.orchestrator.analyze().await;
    assert!(matches!(outcome, AnalyzeOutcome::Rejected(ValidationError::OfflineNoInput)));
    assert!(h.ctx.history.is_empty().await);
    assert_eq!(h.notices(), vec![NoticeKind::OfflineNoInput]);
}

#[tokio::test]
async fn online_validation_names_the_missing_input() {
    let mut h = harness(true).await;
    assert!(matches!(
        h.ctx.orchestrator.analyze().await,
        AnalyzeOutcome::Rejected(ValidationError::MissingImage)
    ));
    h.ctx.orchestrator.set_mode(AnalysisMode::Text);
    h.ctx.orchestrator.set_text_query("   ");
    assert!(matches!(
        h.ctx.orchestrator.analyze().await,
        AnalyzeOutcome::Rejected(ValidationError::EmptyQuery)
    ));
    assert_eq!(h.notices(), vec![NoticeKind::SelectImage, NoticeKind::EnterQuestion]);
    assert_eq!(h.llm.total_calls(), 0);
}

#[tokio::test]
async fn same_image_twice_is_served_from_cache() {
    let mut h = harness(true).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap();

    let AnalyzeOutcome::Analyzed(first) = orchestrator.analyze().await else {
        panic!("first request should reach the service");
    };
    let AnalyzeOutcome::Cached(second) = orchestrator.analyze().await else {
        panic!("second request should hit the cache");
    };

    assert_eq!(first, second);
    assert_eq!(h.llm.image_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.ctx.history.len().await, 1);
    assert_eq!(h.ctx.history.snapshot().await[0].sync_status(), SyncStatus::Synced);
    assert_eq!(h.ctx.cache.len().await, 1);
    assert!(h.notices().contains(&NoticeKind::LoadedFromCache));
    assert_eq!(orchestrator.current_result(), Some(first));
}

#[tokio::test]
async fn text_cache_key_ignores_surrounding_whitespace() {
    let h = harness(true).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.set_mode(AnalysisMode::Text);
    orchestrator.set_text_query("glass jars");
    assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Analyzed(_)));
    orchestrator.set_text_query("  glass jars ");
    assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Cached(_)));
    assert_eq!(h.llm.text_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn analyzed_query_is_recorded_as_typed() {
    let h = harness(true).await;
    h.ctx.orchestrator.set_mode(AnalysisMode::Text);
    h.ctx.orchestrator.set_text_query(" tetra pak ");

    assert!(matches!(h.ctx.orchestrator.analyze().await, AnalyzeOutcome::Analyzed(_)));
    let history = h.ctx.history.snapshot().await;
    let HistoryItem::Text(item) = &history[0] else { panic!("expected text item") };
    assert_eq!(item.original_query, " tetra pak ");
    assert!(h.ctx.cache.get("tetra pak").await.is_some());
}

#[tokio::test]
async fn online_failure_leaves_no_history() {
    let mut h = harness(true).await;
    h.llm.fail(IMAGE_KEY);
    h.ctx.orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap();

    let outcome = h.ctx.orchestrator.analyze().await;
    assert!(matches!(outcome, AnalyzeOutcome::Failed(_)));
    assert!(h.ctx.history.is_empty().await);
    assert!(h.ctx.cache.is_empty().await);

    let notice = loop {
        let notice = h.notices.try_recv().unwrap();
        if notice.kind == NoticeKind::AnalysisFailed {
            break notice;
        }
    };
    assert!(notice.message.starts_with("Could not analyze the image"));
    assert!(notice.message.contains("500"));
}

#[tokio::test]
async fn reanalysis_bypasses_the_cache() {
    let h = harness(true).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.set_mode(AnalysisMode::Text);
    orchestrator.set_text_query("old paint");
    assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Analyzed(_)));

    let id = h.ctx.history.snapshot().await[0].id().to_owned();
    let loaded = orchestrator.select_history_item(&id).await.unwrap();
    assert!(loaded.reanalyzing);
    assert_eq!(loaded.text_query, "old paint");
    assert!(matches!(loaded.result, Some(AnalysisResult::Text(_))));

    assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Analyzed(_)));
    assert_eq!(h.llm.text_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.ctx.history.len().await, 2);
    assert!(!orchestrator.editor_snapshot().reanalyzing);
}

#[tokio::test]
async fn selecting_an_image_entry_restores_the_image() {
    let h = harness(true).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap();
    orchestrator.analyze().await;
    orchestrator.clear();
    assert!(orchestrator.editor_snapshot().image.is_none());

    let id = h.ctx.history.snapshot().await[0].id().to_owned();
    let loaded = orchestrator.select_history_item(&id).await.unwrap();
    let image = loaded.image.unwrap();
    assert_eq!(&*image.bytes, JPEG);
    assert_eq!(image.media_type, "image/jpeg");

    assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Analyzed(_)));
    assert_eq!(h.llm.image_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pending_and_failed_entries_do_not_arm_reanalysis() {
    let mut h = harness(false).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.set_mode(AnalysisMode::Text);
    orchestrator.set_text_query("pizza boxes");
    orchestrator.analyze().await;
    h.notices();

    let id = h.ctx.history.snapshot().await[0].id().to_owned();
    let loaded = orchestrator.select_history_item(&id).await.unwrap();
    assert!(!loaded.reanalyzing);
    assert!(loaded.result.is_none());
    assert_eq!(h.notices(), vec![NoticeKind::HistoryPending]);

    let failed = h.ctx.history.snapshot().await[0].clone().into_error();
    h.ctx.history.replace(vec![failed]).await.unwrap();
    let loaded = orchestrator.select_history_item(&id).await.unwrap();
    assert!(!loaded.reanalyzing);
    assert_eq!(h.notices(), vec![NoticeKind::HistoryError]);

    assert!(orchestrator.select_history_item("missing").await.is_none());
}

#[tokio::test]
async fn oversized_image_is_rejected_before_any_change() {
    let settings = Settings { max_image_bytes: 4, ..Settings::default() };
    let mut h = harness_with(true, settings, Probes::default()).await;

    let err = h.ctx.orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap_err();
    assert_eq!(err, ValidationError::ImageTooLarge { size: JPEG.len(), limit: 4 });
    assert!(h.ctx.orchestrator.editor_snapshot().image.is_none());
    assert_eq!(h.notices(), vec![NoticeKind::ImageTooLarge]);
}

#[tokio::test]
async fn embedded_gps_is_attached_and_sent() {
    let location = Location::new(48.8566, 2.3522);
    let probe = Arc::new(FixedProbe { location: Some(location), delay: Duration::ZERO });
    let probes = Probes { location: Arc::new(FixedProbe { location: None, delay: Duration::ZERO }), metadata: probe };
    let mut h = harness_with(true, Settings::default(), probes).await;

    h.ctx.orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap();
    assert_eq!(h.ctx.orchestrator.editor_snapshot().location, Some(location));
    assert_eq!(h.notices(), vec![NoticeKind::GpsFound]);

    let AnalyzeOutcome::Analyzed(AnalysisResult::Image(result)) = h.ctx.orchestrator.analyze().await else {
        panic!("expected an image result");
    };
    assert_eq!(result.location, Some(location));
    assert_eq!(*h.llm.last_location.lock().unwrap(), Some(location));
    let HistoryItem::Image(item) = &h.ctx.history.snapshot().await[0] else { panic!("expected image item") };
    assert_eq!(item.location, Some(location));
    assert!(!h.notices().contains(&NoticeKind::LocationUsed));
}

#[tokio::test]
async fn device_location_fills_in_when_metadata_has_none() {
    let location = Location::new(-33.8688, 151.2093);
    let probes = Probes {
        location: Arc::new(FixedProbe { location: Some(location), delay: Duration::ZERO }),
        metadata: Arc::new(FixedProbe { location: None, delay: Duration::ZERO }),
    };
    let mut h = harness_with(true, Settings::default(), probes).await;
    h.ctx.orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap();
    h.ctx.orchestrator.analyze().await;

    assert_eq!(*h.llm.last_location.lock().unwrap(), Some(location));
    assert!(h.notices().contains(&NoticeKind::LocationUsed));
}

#[tokio::test]
async fn slow_geolocation_does_not_block_analysis() {
    let settings = Settings { geolocation_timeout_ms: 20, ..Settings::default() };
    let probes = Probes {
        location: Arc::new(FixedProbe { location: Some(Location::new(1.0, 1.0)), delay: Duration::from_secs(30) }),
        metadata: Arc::new(FixedProbe { location: None, delay: Duration::ZERO }),
    };
    let h = harness_with(true, settings, probes).await;
    h.ctx.orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap();

    assert!(matches!(h.ctx.orchestrator.analyze().await, AnalyzeOutcome::Analyzed(_)));
    assert_eq!(*h.llm.last_location.lock().unwrap(), None);
}

#[tokio::test]
async fn second_analyze_while_running_is_busy() {
    let mut h = harness(true).await;
    h.ctx.orchestrator.set_mode(AnalysisMode::Text);
    h.ctx.orchestrator.set_text_query("tyres");
    h.llm.hold("tyres");

    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    let first = tokio::spawn(async move { orchestrator.analyze().await });
    let llm = Arc::clone(&h.llm);
    wait_until(|| llm.text_calls.load(Ordering::SeqCst) == 1).await;

    assert!(matches!(h.ctx.orchestrator.analyze().await, AnalyzeOutcome::Busy));
    assert!(h.notices().contains(&NoticeKind::Busy));

    h.llm.release("tyres");
    assert!(matches!(first.await.unwrap(), AnalyzeOutcome::Analyzed(_)));
    assert_eq!(h.llm.text_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.ctx.history.len().await, 1);
}

#[tokio::test]
async fn late_result_is_recorded_but_not_shown_after_input_change() {
    let h = harness(true).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.set_mode(AnalysisMode::Text);
    orchestrator.set_text_query("coffee cups");
    h.llm.hold("coffee cups");

    let running = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.analyze().await })
    };
    let llm = Arc::clone(&h.llm);
    wait_until(|| llm.text_calls.load(Ordering::SeqCst) == 1).await;
    orchestrator.set_text_query("something else");
    h.llm.release("coffee cups");

    assert!(matches!(running.await.unwrap(), AnalyzeOutcome::Analyzed(_)));
    assert!(orchestrator.current_result().is_none());
    assert_eq!(orchestrator.editor_snapshot().text_query, "something else");
    assert_eq!(h.ctx.history.len().await, 1);
    assert!(h.ctx.cache.get("coffee cups").await.is_some());
}

#[tokio::test]
async fn history_stays_newest_first_with_unique_ids() {
    let h = harness(true).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.set_mode(AnalysisMode::Text);
    for query in ["cans", "glass", "paper", "batteries", "cork"] {
        orchestrator.set_text_query(query);
        assert!(matches!(orchestrator.analyze().await, AnalyzeOutcome::Analyzed(_)));
    }

    let history = h.ctx.history.snapshot().await;
    assert_eq!(history.len(), 5);
    let ids: HashSet<&str> = history.iter().map(HistoryItem::id).collect();
    assert_eq!(ids.len(), 5);
    assert!(history.windows(2).all(|pair| pair[0].timestamp() >= pair[1].timestamp()));
    let HistoryItem::Text(newest) = &history[0] else { panic!("expected text item") };
    assert_eq!(newest.original_query, "cork");
}

#[tokio::test]
async fn mode_switch_and_clear_reset_input() {
    let h = harness(true).await;
    let orchestrator = Arc::clone(&h.ctx.orchestrator);
    orchestrator.select_image(JPEG.to_vec(), "image/jpeg").await.unwrap();
    orchestrator.analyze().await;
    assert!(orchestrator.current_result().is_some());

    orchestrator.set_mode(AnalysisMode::Image);
    assert!(orchestrator.editor_snapshot().image.is_some());

    orchestrator.set_mode(AnalysisMode::Text);
    let snapshot = orchestrator.editor_snapshot();
    assert_eq!(snapshot.mode, AnalysisMode::Text);
    assert!(snapshot.image.is_none());
    assert!(snapshot.result.is_none());

    orchestrator.set_text_query("styrofoam");
    orchestrator.clear();
    let snapshot = orchestrator.editor_snapshot();
    assert_eq!(snapshot.mode, AnalysisMode::Text);
    assert!(snapshot.text_query.is_empty());
}

#[tokio::test]
async fn learn_more_expands_a_fact() {
    let mut h = harness(true).await;
    let content = h.ctx.orchestrator.learn_more("Aluminium is infinitely recyclable").await.unwrap();
    assert_eq!(content.title, "Aluminium is infinitely recyclable");
    assert_eq!(content.content, "More about: Aluminium is infinitely recyclable");

    h.llm.fail("Glass never degrades");
    assert!(h.ctx.orchestrator.learn_more("Glass never degrades").await.is_none());
    assert_eq!(h.notices(), vec![NoticeKind::EducationalContentFailed]);
}

#[tokio::test]
async fn clear_history_empties_the_store() {
    let h = harness(false).await;
    h.ctx.orchestrator.select_image(JPEG.to_vec(), "image/png").await.unwrap();
    h.ctx.orchestrator.analyze().await;
    assert_eq!(h.ctx.history.len().await, 1);

    h.ctx.orchestrator.clear_history().await.unwrap();
    assert!(h.ctx.history.is_empty().await);
}

#[tokio::test]
async fn analyzing_stops_playback() {
    let h = harness(true).await;
    h.ctx.audio.toggle("item-1", "Recycle the can").await.unwrap();
    assert_eq!(h.output.live(), 1);

    h.ctx.orchestrator.set_mode(AnalysisMode::Text);
    assert_eq!(h.output.live(), 0);
    assert_eq!(h.ctx.audio.status(), crate::AudioStatus::Idle);
}
