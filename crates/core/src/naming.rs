//! File naming conventions for downloaded and served audio.

use crate::generation::AudioFormat;

/// Number of prompt characters used for a download filename.
const DOWNLOAD_NAME_PROMPT_CHARS: usize = 40;

/// Fallback stem when nothing usable is left after sanitizing.
const FALLBACK_STEM: &str = "track";

/// Local filename for a generated track: `{task_id}.{format}`.
///
/// The task id comes from the remote service, so anything outside
/// `[A-Za-z0-9_-]` is replaced with `_` to keep the file inside the output
/// directory.
///
/// ```
/// use acemusic_core::generation::AudioFormat;
/// use acemusic_core::naming::audio_file_name;
///
/// assert_eq!(audio_file_name("t1", AudioFormat::Mp3), "t1.mp3");
/// assert_eq!(audio_file_name("../etc/passwd", AudioFormat::Wav), "___etc_passwd.wav");
/// ```
pub fn audio_file_name(task_id: &str, format: AudioFormat) -> String {
    let stem: String = task_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() { FALLBACK_STEM } else { &stem };
    format!("{stem}.{}", format.as_str())
}

/// Human-readable attachment filename built from the first 40 characters of
/// the prompt, keeping ASCII letters, digits, spaces, `-` and `_`.
///
/// ```
/// use acemusic_core::generation::AudioFormat;
/// use acemusic_core::naming::download_file_name;
///
/// assert_eq!(download_file_name("Lo-fi: rainy night!", AudioFormat::Mp3), "Lo-fi rainy night.mp3");
/// assert_eq!(download_file_name("???", AudioFormat::Flac), "track.flac");
/// ```
pub fn download_file_name(prompt: &str, format: AudioFormat) -> String {
    let stem: String = prompt
        .chars()
        .take(DOWNLOAD_NAME_PROMPT_CHARS)
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let stem = stem.trim();
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };
    format!("{stem}.{}", format.as_str())
}

/// Round a duration in seconds to one decimal place.
pub fn round_to_tenths(secs: f64) -> f64 {
    (secs * 10.0).round() / 10.0
}
