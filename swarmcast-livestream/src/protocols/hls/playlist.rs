use std::time::Duration;

/// One `#EXTINF` entry of a media playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub sequence: u64,
    pub name: String,
    pub duration: Duration,
}

/// Sliding-window HLS media playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlaylist {
    pub entries: Vec<PlaylistEntry>,
    pub is_ended: bool,
}

impl MediaPlaylist {
    /// First sequence number in the window
    #[must_use]
    pub fn media_sequence(&self) -> u64 {
        self.entries.first().map_or(0, |e| e.sequence)
    }

    /// Longest segment in whole seconds, rounded up
    #[must_use]
    pub fn target_duration(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| {
                let millis = u64::try_from(e.duration.as_millis()).unwrap_or(u64::MAX);
                millis.div_ceil(1000)
            })
            .max()
            .unwrap_or(10)
    }

    /// Render M3U8 text, naming segments through `gen_segment_url`.
    pub fn render<F>(&self, mut gen_segment_url: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let mut m3u8 = String::new();

        m3u8.push_str("#EXTM3U\n");
        m3u8.push_str("#EXT-X-VERSION:3\n");
        m3u8.push_str(&format!("#EXT-X-TARGETDURATION:{}\n", self.target_duration()));
        m3u8.push_str(&format!("#EXT-X-MEDIA-SEQUENCE:{}\n", self.media_sequence()));

        for entry in &self.entries {
            m3u8.push_str(&format!("#EXTINF:{:.3},\n", entry.duration.as_secs_f64()));
            m3u8.push_str(&gen_segment_url(&entry.name));
            m3u8.push('\n');
        }

        if self.is_ended {
            m3u8.push_str("#EXT-X-ENDLIST\n");
        }

        m3u8
    }
}
