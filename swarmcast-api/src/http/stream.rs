//! Stream control and HLS delivery endpoints.
//!
//! - GET /createStream           - mint an owned RTMP stream
//! - GET /localStreams           - streams known to this node
//! - GET /peersCount             - number of known peers
//! - GET /streamerStatus         - streamer status text
//! - GET /stream/{file}          - HLS playlist (`<address>.m3u8`)
//! - GET /stream/{id}/{segment}  - HLS segment

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use swarmcast_livestream::address::{StreamAddress, StreamFormat};
use swarmcast_livestream::livestream::LOCAL_SUBSCRIBER;

use crate::http::{AppError, AppResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateStreamResponse {
    #[serde(rename = "streamID")]
    pub stream_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocalStreamEntry {
    pub format: StreamFormat,
    #[serde(rename = "streamID")]
    pub stream_id: String,
    /// `"local"` for owned streams, else the owner's node id
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeersCountResponse {
    pub count: usize,
}

pub fn create_stream_router() -> Router<AppState> {
    Router::new()
        .route("/createStream", get(create_stream))
        .route("/localStreams", get(local_streams))
        .route("/peersCount", get(peers_count))
        .route("/streamerStatus", get(streamer_status))
        .route("/stream/{file}", get(hls_playlist))
        .route("/stream/{id}/{segment}", get(hls_segment))
}

async fn create_stream(State(state): State<AppState>) -> AppResult<Json<CreateStreamResponse>> {
    let address = StreamAddress::mint(&state.streamer.self_address());
    let stream = state
        .streamer
        .add_new_network_stream(&address, StreamFormat::Rtmp)?;

    info!(stream_id = %stream.address, "Created stream");
    Ok(Json(CreateStreamResponse {
        stream_id: stream.address.to_string(),
    }))
}

async fn local_streams(State(state): State<AppState>) -> Json<Vec<LocalStreamEntry>> {
    let node = state.streamer.self_address();
    let streams = state
        .streamer
        .get_all_network_streams()
        .into_iter()
        .map(|s| LocalStreamEntry {
            format: s.format,
            stream_id: s.address.to_string(),
            source: if s.address.is_owned_by(&node) {
                "local".to_string()
            } else {
                s.address.owner().to_string()
            },
        })
        .collect();
    Json(streams)
}

async fn peers_count(State(state): State<AppState>) -> Json<PeersCountResponse> {
    Json(PeersCountResponse {
        count: state.peers.peers_count(),
    })
}

async fn streamer_status(State(state): State<AppState>) -> String {
    state.streamer.current_status()
}

/// GET /stream/{address}.m3u8
///
/// Waits for the buffer to become ready, so a cold stream can take up to the
/// configured readiness ceiling to answer.
async fn hls_playlist(
    Path(file): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let request_path = format!("/stream/{file}");
    let address = StreamAddress::parse(&request_path);
    debug!(stream_id = %address, "HLS playlist request");

    let buffer = state.handler.resolve_hls_playback(&request_path).await?;
    let playlist = buffer.latest_playlist().map_err(swarmcast_livestream::StreamError::from)?;
    let body = playlist.render(|name| format!("/stream/{address}/{name}"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/vnd.apple.mpegurl"),
            (header::CACHE_CONTROL, "no-cache, no-store"),
        ],
        body,
    )
        .into_response())
}

/// GET /stream/{address}/{segment}
async fn hls_segment(
    Path((id, segment)): Path<(String, String)>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let address = StreamAddress::from(id);
    let Some(buffer) = state.streamer.get_hls_muxer(&address, LOCAL_SUBSCRIBER) else {
        warn!(stream_id = %address, "HLS segment requested without a subscription");
        return Err(AppError::not_found("HLS stream not found"));
    };
    let Some(found) = buffer.segment(&segment) else {
        warn!(stream_id = %address, segment = %segment, "HLS segment not found");
        return Err(AppError::not_found("HLS segment not found"));
    };

    debug!(
        stream_id = %address,
        segment = %segment,
        size = found.data.len(),
        "Serving HLS segment"
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "video/mp2t"),
            (header::CACHE_CONTROL, "public, max-age=90"),
        ],
        found.data,
    )
        .into_response())
}
