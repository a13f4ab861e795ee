// Router behaviour against the in-process streamer and recording mocks.
//
// Time is paused, so the readiness ceiling and poll interval run at their
// production values without slowing the suite down.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use swarmcast_core::NodeId;
use swarmcast_livestream::address::StreamAddress;
use swarmcast_livestream::livestream::{
    LivestreamConfig, LivestreamServer, MediaRouter, RouterConfig, StreamHandler, LOCAL_SUBSCRIBER,
};
use swarmcast_livestream::protocols::hls::{HlsSegment, MediaBuffer};
use swarmcast_livestream::protocols::rtmp::{ChannelSink, MediaPacket};
use swarmcast_livestream::relay::mocks::{ForwardCall, MockForwarder, MockVizSink, ScriptedBuffer};
use swarmcast_livestream::relay::{Forwarder, LocalStreamer, Streamer, VizSink};
use swarmcast_livestream::{StreamError, StreamFormat};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

const SELF: [u8; 32] = [0xaa; 32];
const PEER: [u8; 32] = [0xbb; 32];

struct Harness {
    streamer: Arc<LocalStreamer>,
    forwarder: Arc<MockForwarder>,
    viz: Arc<MockVizSink>,
    router: Arc<MediaRouter>,
}

fn harness() -> Harness {
    let streamer = Arc::new(LocalStreamer::new(NodeId::from_bytes(SELF)));
    let forwarder = Arc::new(MockForwarder::failing_stop());
    let viz = Arc::new(MockVizSink::new());
    let router = Arc::new(MediaRouter::new(
        Arc::clone(&streamer) as Arc<dyn Streamer>,
        Arc::clone(&forwarder) as Arc<dyn Forwarder>,
        Arc::clone(&viz) as Arc<dyn VizSink>,
        RouterConfig::default(),
    ));
    Harness {
        streamer,
        forwarder,
        viz,
        router,
    }
}

fn own(local: &str) -> StreamAddress {
    StreamAddress::make(&NodeId::from_bytes(SELF), local)
}

fn foreign(local: &str) -> StreamAddress {
    StreamAddress::make(&NodeId::from_bytes(PEER), local)
}

fn playlist_path(address: &StreamAddress) -> String {
    format!("/stream/{address}.m3u8")
}

fn preload(streamer: &LocalStreamer, address: &StreamAddress, buffer: Arc<ScriptedBuffer>) {
    streamer
        .subscribe_to_hls_stream(address, LOCAL_SUBSCRIBER, buffer as Arc<dyn MediaBuffer>)
        .unwrap();
}

async fn wait_for_viewer(streamer: &LocalStreamer, address: &StreamAddress) {
    while streamer.subscriber_counts(address).1 == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[test]
fn test_address_round_trip() {
    let owner = NodeId::from_bytes(PEER);
    let address = StreamAddress::make(&owner, "cam42");
    let parsed = StreamAddress::parse(&format!("/stream/{address}"));
    assert_eq!(parsed.split_components(), (owner.to_string().as_str(), "cam42"));
}

#[tokio::test(start_paused = true)]
async fn test_hls_empty_address_not_found() {
    let h = harness();
    for path in ["/", "/live/abc.m3u8", "/stream/", "/stream/short.m3u8"] {
        let err = h.router.resolve_hls_playback(path).await.err().unwrap();
        assert!(err.is_not_found(), "{path}: {err}");
    }
    assert!(h.forwarder.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hls_owned_missing_stream_is_not_forwarded() {
    let h = harness();
    let err = h
        .router
        .resolve_hls_playback(&playlist_path(&own("gone")))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, StreamError::NotFound(_)));
    assert!(h.forwarder.calls().is_empty());
    assert!(h.router.timers().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hls_foreign_stream_forwards_once_per_call() {
    let h = harness();
    let address = foreign("remote");
    preload(&h.streamer, &address, ScriptedBuffer::ready());

    for expected in 1..=2 {
        h.router
            .resolve_hls_playback(&playlist_path(&address))
            .await
            .unwrap();
        assert_eq!(h.forwarder.count(ForwardCall::Stream), expected);
    }
    assert_eq!(
        h.forwarder.calls()[0],
        (ForwardCall::Stream, address.clone(), StreamFormat::Hls)
    );
}

#[tokio::test(start_paused = true)]
async fn test_hls_concurrent_misses_share_one_buffer() {
    let h = harness();
    let address = foreign("shared");
    let path = playlist_path(&address);

    let publisher = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let segment = HlsSegment::new(0, "0.ts", Duration::from_secs(2), Bytes::from_static(b"ts"));
        assert_eq!(h.streamer.publish_hls_segment(&address, segment), 1);
    };
    let (first, second, ()) = tokio::join!(
        h.router.resolve_hls_playback(&path),
        h.router.resolve_hls_playback(&path),
        publisher
    );

    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(h.streamer.subscriber_counts(&address), (1, 0));
    assert!(h.router.timers().last_access(&address).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_hls_ready_buffer_refreshes_activity() {
    let h = harness();
    let address = foreign("ready");
    preload(&h.streamer, &address, ScriptedBuffer::ready());
    let path = playlist_path(&address);

    h.router.resolve_hls_playback(&path).await.unwrap();
    let first = h.router.timers().last_access(&address).unwrap();

    tokio::time::advance(Duration::from_secs(3)).await;
    let (a, b) = tokio::join!(
        h.router.resolve_hls_playback(&path),
        h.router.resolve_hls_playback(&path)
    );
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert!(h.router.timers().last_access(&address).unwrap() > first);
    assert_eq!(h.router.timers().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hls_never_ready_times_out() {
    let h = harness();
    let address = foreign("stuck");
    let buffer = ScriptedBuffer::never_ready();
    preload(&h.streamer, &address, Arc::clone(&buffer));

    let started = Instant::now();
    let err = h
        .router
        .resolve_hls_playback(&playlist_path(&address))
        .await
        .err()
        .unwrap();
    let waited = started.elapsed();

    assert!(err.is_not_found());
    assert!(waited >= Duration::from_secs(10), "{waited:?}");
    assert!(waited <= Duration::from_secs(13), "{waited:?}");
    // ceiling / interval, plus the probe before the first sleep
    assert!((5..=6).contains(&buffer.polls()), "{}", buffer.polls());
    assert!(h.router.timers().is_empty());
    // The abandoned subscription and its forward do not linger
    assert!(h.streamer.get_hls_muxer(&address, LOCAL_SUBSCRIBER).is_none());
    assert_eq!(
        h.forwarder.calls(),
        vec![
            (ForwardCall::Stream, address.clone(), StreamFormat::Hls),
            (ForwardCall::StopStream, address.clone(), StreamFormat::Hls),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_hls_timeout_releases_created_buffer() {
    let h = harness();
    let silent = foreign("silent");
    let idle = own("idle");
    h.streamer
        .add_new_network_stream(&idle, StreamFormat::Hls)
        .unwrap();

    for address in [&silent, &idle] {
        let err = h
            .router
            .resolve_hls_playback(&playlist_path(address))
            .await
            .err()
            .unwrap();
        assert!(err.is_not_found());
        assert!(h.streamer.get_hls_muxer(address, LOCAL_SUBSCRIBER).is_none());
        assert_eq!(h.streamer.subscriber_counts(address), (0, 0));
    }

    // Only the forwarded stream is stopped
    assert_eq!(h.forwarder.count(ForwardCall::Stream), 1);
    assert_eq!(h.forwarder.count(ForwardCall::StopStream), 1);
    assert!(h.router.timers().is_empty());

    // A later request starts over with a fresh buffer
    let publisher = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let segment = HlsSegment::new(0, "0.ts", Duration::from_secs(2), Bytes::from_static(b"ts"));
        assert_eq!(h.streamer.publish_hls_segment(&idle, segment), 1);
    };
    let idle_playlist = playlist_path(&idle);
    let (resolved, ()) = tokio::join!(h.router.resolve_hls_playback(&idle_playlist), publisher);
    assert!(resolved.is_ok());
    assert!(h.router.timers().last_access(&idle).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_hls_short_timings() {
    let h = harness();
    let router = MediaRouter::new(
        Arc::clone(&h.streamer) as Arc<dyn Streamer>,
        Arc::clone(&h.forwarder) as Arc<dyn Forwarder>,
        Arc::clone(&h.viz) as Arc<dyn VizSink>,
        RouterConfig::default().with_timeouts(Duration::from_millis(100), Duration::from_millis(20)),
    );
    let address = foreign("fast");
    let buffer = ScriptedBuffer::never_ready();
    preload(&h.streamer, &address, Arc::clone(&buffer));

    assert!(router.resolve_hls_playback(&playlist_path(&address)).await.is_err());
    assert!((5..=6).contains(&buffer.polls()));
}

#[test]
fn test_publish_rejects_foreign_raw_address() {
    let h = harness();
    let url = Url::parse(&format!("rtmp://localhost:1935/stream/{}", foreign("x"))).unwrap();

    let err = h.router.resolve_rtmp_publish(&url).unwrap_err();
    assert!(matches!(err, StreamError::StreamPublish(_)));
    assert!(h.streamer.get_all_network_streams().is_empty());
    assert!(h.viz.broadcasts().is_empty());
}

#[test]
fn test_publish_rejects_foreign_packaged_address() {
    let h = harness();
    let url = Url::parse(&format!(
        "rtmp://localhost:1935/stream/{}?hlsStrmID={}",
        own("raw"),
        foreign("pkg")
    ))
    .unwrap();

    assert!(matches!(
        h.router.resolve_rtmp_publish(&url),
        Err(StreamError::StreamPublish(_))
    ));
    assert!(h.streamer.get_all_network_streams().is_empty());
}

#[test]
fn test_publish_twice_reuses_raw_stream() {
    let h = harness();
    let raw_address = own("raw");
    let url = Url::parse(&format!("rtmp://localhost:1935/stream/{raw_address}")).unwrap();

    let (raw1, pkg1) = h.router.resolve_rtmp_publish(&url).unwrap();
    let (raw2, pkg2) = h.router.resolve_rtmp_publish(&url).unwrap();

    assert_eq!(raw1.address, raw_address);
    assert!(Arc::ptr_eq(&raw1, &raw2));
    assert_ne!(pkg1.address, pkg2.address);
    assert_eq!(pkg1.format, StreamFormat::Hls);
    assert_eq!(h.streamer.get_all_network_streams().len(), 3);
}

#[test]
fn test_publish_uses_supplied_packaged_address() {
    let h = harness();
    let packaged = own("pkg");
    let url = Url::parse(&format!(
        "rtmp://localhost:1935/stream/{}?hlsStrmID={packaged}",
        own("raw")
    ))
    .unwrap();

    let (raw, pkg) = h.router.resolve_rtmp_publish(&url).unwrap();
    assert_eq!(pkg.address, packaged);
    assert_eq!(h.viz.broadcasts(), vec![raw.address.clone(), packaged]);
}

#[tokio::test]
async fn test_finish_session_is_unconditional() {
    let h = harness();
    let url = Url::parse("rtmp://localhost:1935/live").unwrap();
    let (raw, pkg) = h.router.resolve_rtmp_publish(&url).unwrap();
    preload(&h.streamer, &pkg.address, ScriptedBuffer::ready());
    h.router
        .resolve_hls_playback(&playlist_path(&pkg.address))
        .await
        .unwrap();
    assert!(h.router.timers().last_access(&pkg.address).is_some());

    h.router.finish_rtmp_session(&raw.address, &pkg.address);
    assert!(h.streamer.get_all_network_streams().is_empty());
    assert!(h.streamer.get_hls_muxer(&pkg.address, LOCAL_SUBSCRIBER).is_none());
    // Nothing left for the reaper to evict
    assert!(h.router.timers().last_access(&pkg.address).is_none());
    assert!(h.router.timers().is_empty());

    // Finishing again is harmless
    h.router.finish_rtmp_session(&raw.address, &pkg.address);
}

#[tokio::test]
async fn test_rtmp_playback_copies_until_session_ends() {
    let h = harness();
    let address = foreign("live");
    let (tx, mut rx) = mpsc::channel(16);

    let playback = {
        let router = Arc::clone(&h.router);
        let path = format!("/stream/{address}");
        tokio::spawn(async move {
            let mut sink = ChannelSink::new(tx);
            router
                .resolve_rtmp_playback(CancellationToken::new(), &path, &mut sink)
                .await
        })
    };
    wait_for_viewer(&h.streamer, &address).await;

    let header = MediaPacket::video(0, Bytes::from_static(b"avc"), true, true);
    let frame = MediaPacket::video(33, Bytes::from_static(b"idr"), true, false);
    h.streamer.publish_packet(&address, header.clone());
    h.streamer.publish_packet(&address, frame.clone());
    assert_eq!(rx.recv().await.unwrap(), header);
    assert_eq!(rx.recv().await.unwrap(), frame);

    h.router.finish_rtmp_session(&address, &foreign("unused"));
    playback.await.unwrap().unwrap();

    assert_eq!(h.viz.consumes(), vec![address.clone()]);
    assert_eq!(h.forwarder.count(ForwardCall::Stream), 1);
    assert_eq!(h.forwarder.count(ForwardCall::StopStream), 1);
    assert_eq!(h.streamer.subscriber_counts(&address), (0, 0));
}

#[tokio::test]
async fn test_rtmp_playback_cancellation() {
    let h = harness();
    let address = own("quiet");
    h.streamer
        .add_new_network_stream(&address, StreamFormat::Rtmp)
        .unwrap();
    let cancel = CancellationToken::new();
    let (tx, _rx) = mpsc::channel(4);

    let playback = {
        let router = Arc::clone(&h.router);
        let cancel = cancel.clone();
        let path = format!("/stream/{address}");
        tokio::spawn(async move {
            let mut sink = ChannelSink::new(tx);
            router.resolve_rtmp_playback(cancel, &path, &mut sink).await
        })
    };
    wait_for_viewer(&h.streamer, &address).await;

    cancel.cancel();
    let result = playback.await.unwrap();
    assert!(matches!(result, Err(StreamError::Cancelled)));

    // Local stream: no forward, but the stop is still attempted
    assert_eq!(h.forwarder.count(ForwardCall::Stream), 0);
    assert_eq!(h.forwarder.count(ForwardCall::StopStream), 1);
    assert_eq!(h.streamer.subscriber_counts(&address), (0, 0));
}

#[tokio::test]
async fn test_rtmp_playback_sink_failure() {
    let h = harness();
    let address = own("drop");
    h.streamer
        .add_new_network_stream(&address, StreamFormat::Rtmp)
        .unwrap();
    let (tx, rx) = mpsc::channel(4);
    drop(rx);

    let playback = {
        let router = Arc::clone(&h.router);
        let path = format!("/stream/{address}");
        tokio::spawn(async move {
            let mut sink = ChannelSink::new(tx);
            router
                .resolve_rtmp_playback(CancellationToken::new(), &path, &mut sink)
                .await
        })
    };
    wait_for_viewer(&h.streamer, &address).await;
    h.streamer.publish_packet(
        &address,
        MediaPacket::audio(0, Bytes::from_static(b"aac"), false),
    );

    assert!(matches!(playback.await.unwrap(), Err(StreamError::Sink(_))));
    assert_eq!(h.streamer.subscriber_counts(&address), (0, 0));
}

#[tokio::test]
async fn test_rtmp_playback_without_address() {
    let h = harness();
    let (tx, _rx) = mpsc::channel(1);
    let mut sink = ChannelSink::new(tx);

    let err = h
        .router
        .resolve_rtmp_playback(CancellationToken::new(), "/live", &mut sink)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(h.viz.consumes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_publish_then_hls_playback_end_to_end() {
    let streamer = Arc::new(LocalStreamer::new(NodeId::from_bytes(SELF)));
    let forwarder = Arc::new(MockForwarder::new());
    let viz = Arc::new(MockVizSink::new());
    let config = LivestreamConfig {
        reaper_enabled: false,
        ..LivestreamConfig::from_config(&swarmcast_core::Config::default())
    };
    let mut handle = LivestreamServer::new(
        config,
        Arc::clone(&streamer) as Arc<dyn Streamer>,
        Arc::clone(&forwarder) as Arc<dyn Forwarder>,
        Arc::clone(&viz) as Arc<dyn VizSink>,
    )
    .start();
    let handler = handle.handler();

    let url = Url::parse("rtmp://localhost:1935/live").unwrap();
    let (raw, packaged) = handler.resolve_rtmp_publish(&url).unwrap();
    let node = NodeId::from_bytes(SELF);
    assert!(raw.address.is_owned_by(&node));
    assert!(packaged.address.is_owned_by(&node));
    assert_ne!(raw.address, packaged.address);
    assert_eq!(viz.broadcasts(), vec![raw.address.clone(), packaged.address.clone()]);

    let buffer = ScriptedBuffer::ready_after(Duration::from_millis(800));
    preload(&streamer, &packaged.address, Arc::clone(&buffer));

    let started = Instant::now();
    let resolved = handler
        .resolve_hls_playback(&playlist_path(&packaged.address))
        .await
        .unwrap();
    let waited = started.elapsed();

    assert!(Arc::ptr_eq(&resolved, &(buffer.clone() as Arc<dyn MediaBuffer>)));
    assert!(waited < Duration::from_secs(3), "{waited:?}");
    assert_eq!(buffer.polls(), 2);
    assert_eq!(handle.timers().len(), 1);
    assert!(forwarder.calls().is_empty());

    assert!(handle.shutdown_graceful(1).await);
}
