use std::{
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use futures::StreamExt;
use serde_json::{json, Value};
use sr_media_events::{CoalescingSource, MediaEvent, MediaEventBus, RemoteFeed};
use sr_rpc::{Error, Observer, PushSource};
use tokio::{task::yield_now, time::advance};

const WINDOW: Duration = Duration::from_millis(250);

#[derive(Default)]
struct Collect {
	data: Mutex<Vec<Value>>,
	errors: AtomicUsize,
	completed: AtomicBool,
}

impl Collect {
	fn data(&self) -> Vec<Value> {
		self.data.lock().unwrap().clone()
	}
}

impl Observer for Collect {
	fn on_data(&self, payload: Value) {
		self.data.lock().unwrap().push(payload);
	}

	fn on_error(&self, _: Error) {
		self.errors.fetch_add(1, Ordering::SeqCst);
	}

	fn on_complete(&self) {
		self.completed.store(true, Ordering::SeqCst);
	}
}

async fn settle() {
	for _ in 0..16 {
		yield_now().await;
	}
}

/// Emits and lets the driver pick the event up before anything else happens.
async fn emit(bus: &MediaEventBus, event: MediaEvent) {
	bus.emit(event);
	settle().await;
}

async fn elapse(duration: Duration) {
	advance(duration).await;
	settle().await;
}

#[tokio::test(start_paused = true)]
async fn burst_within_the_window_is_one_batch() {
	let bus = MediaEventBus::new(64);
	let observer = Arc::new(Collect::default());
	let _unsubscribe = Box::new(CoalescingSource::new(&bus, WINDOW)).subscribe(observer.clone());
	settle().await;

	emit(&bus, MediaEvent::add("/library/a.mp4")).await;
	elapse(Duration::from_millis(100)).await;
	emit(&bus, MediaEvent::thumbnail("/library/a.mp4")).await;
	emit(&bus, MediaEvent::add("/library/a.mp4")).await;
	elapse(Duration::from_millis(100)).await;
	emit(&bus, MediaEvent::refresh()).await;
	emit(&bus, MediaEvent::refresh()).await;

	assert!(observer.data().is_empty());

	elapse(Duration::from_millis(51)).await;

	assert_eq!(
		observer.data(),
		[json!([
			{ "type": "add", "path": "/library/a.mp4" },
			{ "type": "thumbnail", "path": "/library/a.mp4" },
			{ "type": "refresh", "path": "*" },
		])]
	);

	// Nothing left to fire
	elapse(WINDOW * 4).await;
	assert_eq!(observer.data().len(), 1);
	assert!(!observer.completed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn later_change_to_a_path_replaces_the_earlier_one() {
	let bus = MediaEventBus::new(64);
	let observer = Arc::new(Collect::default());
	let _unsubscribe = Box::new(CoalescingSource::new(&bus, WINDOW)).subscribe(observer.clone());
	settle().await;

	emit(&bus, MediaEvent::add("/a")).await;
	emit(&bus, MediaEvent::update("/a")).await;
	emit(&bus, MediaEvent::add("/b")).await;
	elapse(WINDOW + Duration::from_millis(1)).await;

	assert_eq!(
		observer.data(),
		[json!([
			{ "type": "update", "path": "/a" },
			{ "type": "add", "path": "/b" },
		])]
	);
}

#[tokio::test(start_paused = true)]
async fn events_further_apart_than_the_window_are_separate_batches() {
	let bus = MediaEventBus::new(64);
	let observer = Arc::new(Collect::default());
	let _unsubscribe = Box::new(CoalescingSource::new(&bus, WINDOW)).subscribe(observer.clone());
	settle().await;

	emit(&bus, MediaEvent::add("/library/a.mp4")).await;
	elapse(WINDOW + Duration::from_millis(1)).await;
	emit(&bus, MediaEvent::add("/library/a.mp4")).await;
	elapse(WINDOW + Duration::from_millis(1)).await;

	assert_eq!(
		observer.data(),
		[
			json!([{ "type": "add", "path": "/library/a.mp4" }]),
			json!([{ "type": "add", "path": "/library/a.mp4" }]),
		]
	);
}

#[tokio::test(start_paused = true)]
async fn unsubscribing_mid_window_emits_nothing() {
	let bus = MediaEventBus::new(64);
	let observer = Arc::new(Collect::default());
	let mut unsubscribe =
		Box::new(CoalescingSource::new(&bus, WINDOW)).subscribe(observer.clone());
	settle().await;

	emit(&bus, MediaEvent::delete("/library/a.mp4")).await;
	elapse(WINDOW / 2).await;

	unsubscribe.cancel();
	unsubscribe.cancel();
	elapse(WINDOW * 2).await;

	emit(&bus, MediaEvent::delete("/library/b.mp4")).await;
	elapse(WINDOW * 2).await;

	assert!(observer.data().is_empty());
	assert!(!observer.completed.load(Ordering::SeqCst));
	assert_eq!(bus.listeners(), 0);
}

#[tokio::test(start_paused = true)]
async fn closing_the_bus_flushes_and_completes() {
	let bus = MediaEventBus::new(64);
	let observer = Arc::new(Collect::default());
	let _unsubscribe = Box::new(CoalescingSource::new(&bus, WINDOW)).subscribe(observer.clone());
	settle().await;

	emit(&bus, MediaEvent::update("/library/a.mp4")).await;
	drop(bus);
	settle().await;

	assert_eq!(
		observer.data(),
		[json!([{ "type": "update", "path": "/library/a.mp4" }])]
	);
	assert!(observer.completed.load(Ordering::SeqCst));
	assert_eq!(observer.errors.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn lagging_behind_asks_for_a_refresh() {
	let bus = MediaEventBus::new(1);
	let observer = Arc::new(Collect::default());
	let _unsubscribe = Box::new(CoalescingSource::new(&bus, WINDOW)).subscribe(observer.clone());
	settle().await;

	// Sent faster than the driver reads them
	bus.emit(MediaEvent::delete("/library/a.mp4"));
	bus.emit(MediaEvent::delete("/library/b.mp4"));
	bus.emit(MediaEvent::delete("/library/c.mp4"));
	settle().await;

	elapse(WINDOW + Duration::from_millis(1)).await;

	assert_eq!(
		observer.data(),
		[json!([
			{ "type": "refresh", "path": "*" },
			{ "type": "delete", "path": "/library/c.mp4" },
		])]
	);
}

#[tokio::test(start_paused = true)]
async fn remote_feed_streams_batches_until_dropped() {
	let bus = MediaEventBus::new(64);
	let mut feed = RemoteFeed::new(&bus, WINDOW);
	settle().await;

	emit(&bus, MediaEvent::delete("/library/clip.mp4")).await;
	emit(&bus, MediaEvent::delete("/library/clip.mp4")).await;
	elapse(WINDOW + Duration::from_millis(1)).await;

	let batch = feed.next().await.unwrap();
	assert_eq!(batch.events(), [MediaEvent::delete("/library/clip.mp4")]);
	assert_eq!(
		batch.into_message().unwrap(),
		sr_rpc::PushMessage::Data(json!([{ "type": "delete", "path": "/library/clip.mp4" }]))
	);

	assert!(bus.listeners() > 0);
	drop(feed);
	settle().await;
	assert_eq!(bus.listeners(), 0);
}

#[tokio::test(start_paused = true)]
async fn remote_feed_ends_with_the_bus() {
	let bus = MediaEventBus::new(64);
	let mut feed = RemoteFeed::new(&bus, WINDOW);
	settle().await;

	emit(&bus, MediaEvent::add("/library/a.mp4")).await;
	drop(bus);

	let batch = feed.next().await.unwrap();
	assert_eq!(batch.len(), 1);
	assert!(feed.next().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_batch_starts_once_cancel_returns() {
	let bus = Arc::new(MediaEventBus::new(1024));
	let observer = Arc::new(Collect::default());
	let mut unsubscribe = Box::new(CoalescingSource::new(&bus, Duration::from_millis(1)))
		.subscribe(observer.clone());

	let producer = tokio::spawn({
		let bus = Arc::clone(&bus);
		async move {
			for i in 0..200 {
				bus.emit(MediaEvent::add(format!("/library/{i}.mp4")));
				tokio::time::sleep(Duration::from_micros(200)).await;
			}
		}
	});

	tokio::time::sleep(Duration::from_millis(10)).await;
	unsubscribe.cancel();
	let delivered = observer.data().len();

	producer.await.unwrap();
	tokio::time::sleep(Duration::from_millis(20)).await;

	// At most the batch that was being delivered while cancelling
	assert!(observer.data().len() <= delivered + 1);
	assert!(!observer.completed.load(Ordering::SeqCst));
	assert_eq!(bus.listeners(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_remote_feed_drops_the_pending_burst() {
	let bus = MediaEventBus::new(64);
	let mut feed = RemoteFeed::new(&bus, WINDOW);
	settle().await;

	emit(&bus, MediaEvent::add("/library/a.mp4")).await;
	feed.cancel();
	elapse(WINDOW * 2).await;

	assert!(feed.next().await.is_none());
	assert_eq!(bus.listeners(), 0);
}
