//! Stream index translation.
//!
//! Callers select tracks by the server's stream index. Backends address
//! tracks by their position within a kind: the managed pipeline by track
//! group, the native library by its own ids which it resolves from the same
//! position. [`TrackMap`] is built once per load and turns one into the other.
//!
//! Subtitle positions list embedded streams first, then external ones, each
//! in source order. That is the order in which backends attach them.

use bridge_traits::{MediaSource, MediaStream, StreamKind};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMap {
    audio: Vec<i32>,
    subtitles: Vec<i32>,
}

impl TrackMap {
    pub fn build(source: &MediaSource) -> Self {
        let audio = source
            .streams_of(StreamKind::Audio)
            .map(|stream| stream.index)
            .collect();

        let embedded = source
            .streams_of(StreamKind::Subtitle)
            .filter(|stream| !stream.is_external);
        let subtitles = embedded
            .chain(source.external_subtitles())
            .map(|stream| stream.index)
            .collect();

        Self { audio, subtitles }
    }

    /// Backend-side position of the stream with server index `index`.
    pub fn position(&self, kind: StreamKind, index: i32) -> Option<usize> {
        let indices = match kind {
            StreamKind::Audio => &self.audio,
            StreamKind::Subtitle => &self.subtitles,
            _ => return None,
        };
        indices.iter().position(|candidate| *candidate == index)
    }

    pub fn audio_count(&self) -> usize {
        self.audio.len()
    }

    pub fn subtitle_count(&self) -> usize {
        self.subtitles.len()
    }
}

/// MIME type for an external subtitle codec, when one is known.
pub fn subtitle_mime_type(stream: &MediaStream) -> Option<&'static str> {
    let codec = stream.codec.as_deref()?.to_ascii_lowercase();
    match codec.as_str() {
        "srt" | "subrip" => Some("application/x-subrip"),
        "vtt" | "webvtt" => Some("text/vtt"),
        "ass" | "ssa" => Some("text/x-ssa"),
        "ttml" => Some("application/ttml+xml"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(index: i32, kind: StreamKind, external: bool) -> MediaStream {
        MediaStream {
            index,
            kind,
            codec: Some("srt".into()),
            language: None,
            title: None,
            is_default: false,
            is_external: external,
            delivery_url: external.then(|| format!("https://srv/sub/{index}.srt")),
        }
    }

    fn source(streams: Vec<MediaStream>) -> MediaSource {
        MediaSource {
            id: "src".into(),
            name: None,
            container: Some("mkv".into()),
            supports_direct_play: true,
            supports_direct_stream: true,
            supports_transcoding: false,
            transcoding_url: None,
            run_time_ticks: None,
            streams,
        }
    }

    #[test]
    fn embedded_subtitles_precede_external_ones() {
        // Server order interleaves external and embedded streams.
        let map = TrackMap::build(&source(vec![
            stream(0, StreamKind::Video, false),
            stream(1, StreamKind::Audio, false),
            stream(2, StreamKind::Subtitle, true),
            stream(3, StreamKind::Audio, false),
            stream(4, StreamKind::Subtitle, false),
            stream(5, StreamKind::Subtitle, false),
            stream(6, StreamKind::Subtitle, true),
        ]));

        assert_eq!(map.position(StreamKind::Audio, 1), Some(0));
        assert_eq!(map.position(StreamKind::Audio, 3), Some(1));
        assert_eq!(map.position(StreamKind::Subtitle, 4), Some(0));
        assert_eq!(map.position(StreamKind::Subtitle, 5), Some(1));
        assert_eq!(map.position(StreamKind::Subtitle, 2), Some(2));
        assert_eq!(map.position(StreamKind::Subtitle, 6), Some(3));
        assert_eq!(map.subtitle_count(), 4);
    }

    #[test]
    fn unknown_or_unattachable_streams_do_not_map() {
        let mut orphan = stream(9, StreamKind::Subtitle, true);
        orphan.delivery_url = None;
        let map = TrackMap::build(&source(vec![stream(1, StreamKind::Audio, false), orphan]));

        assert_eq!(map.position(StreamKind::Subtitle, 9), None);
        assert_eq!(map.position(StreamKind::Audio, 7), None);
        assert_eq!(map.position(StreamKind::Video, 1), None);
    }

    #[test]
    fn mime_types_follow_codec() {
        let mut sub = stream(2, StreamKind::Subtitle, true);
        assert_eq!(subtitle_mime_type(&sub), Some("application/x-subrip"));
        sub.codec = Some("WebVTT".into());
        assert_eq!(subtitle_mime_type(&sub), Some("text/vtt"));
        sub.codec = Some("pgssub".into());
        assert_eq!(subtitle_mime_type(&sub), None);
    }
}
