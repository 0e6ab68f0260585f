//! Decides which provider owns a submission or a status lookup.

use mf_core::{JobKind, Provider};

/// Video-model-a task ids are decimal numerals at least this long.
pub const NUMERIC_ID_MIN_DIGITS: usize = 15;

const IMAGE_PROVIDERS: [Provider; 1] = [Provider::ImageModel];
const VIDEO_PROVIDERS: [Provider; 2] = [Provider::VideoModelA, Provider::VideoModelB];

/// Providers a new job of `kind` is submitted to. Video fans out to both.
pub fn route_submit(kind: JobKind) -> &'static [Provider] {
    match kind {
        JobKind::ImageGeneration => &IMAGE_PROVIDERS,
        JobKind::VideoGeneration => &VIDEO_PROVIDERS,
    }
}

/// Owner of a status lookup. An explicit tag always wins; without one the
/// id shape is the only signal (see [`infer_video_provider`]).
pub fn route_status(id: &str, tag: Option<Provider>) -> Provider {
    tag.unwrap_or_else(|| infer_video_provider(id))
}

/// Best-effort guess for untagged video ids: long all-digit ids belong to
/// video-model-a, anything else to video-model-b. This is a heuristic and
/// will misroute if either provider changes its id format.
pub fn infer_video_provider(id: &str) -> Provider {
    if is_numeric_task_id(id) {
        Provider::VideoModelA
    } else {
        Provider::VideoModelB
    }
}

pub fn is_numeric_task_id(id: &str) -> bool {
    id.len() >= NUMERIC_ID_MIN_DIGITS && id.bytes().all(|b| b.is_ascii_digit())
}
