//! Sample-accurate mono resampling.
//!
//! Wraps rubato's FFT resampler. The resampler's startup delay is trimmed and
//! the output is cut or zero-padded to exactly `round(len * to / from)`
//! samples, so downstream consumers can rely on the advertised rate.

use crate::error::{Result, TalkGlobeError};
use rubato::{FftFixedIn, Resampler};

/// Input frames fed to the resampler per call.
const CHUNK: usize = 1024;
/// Sub-chunks used by the FFT resampler.
const SUB_CHUNKS: usize = 2;

/// Number of output samples for `input_len` samples converted `from` → `to`.
pub fn output_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return 0;
    }
    let exact = input_len as u128 * to_rate as u128;
    let from = from_rate as u128;
    ((exact + from / 2) / from) as usize
}

/// Resample mono `input` from `from_rate` to `to_rate`.
///
/// Deterministic: the same input always yields the same output.
pub fn resample_mono(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(TalkGlobeError::InvalidAudioInput {
            message: format!("cannot resample from {}Hz to {}Hz", from_rate, to_rate),
        });
    }
    if from_rate == to_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let target_len = output_len(input.len(), from_rate, to_rate);

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK, SUB_CHUNKS, 1)
            .map_err(|e| resample_error(from_rate, to_rate, e))?;
    let delay = resampler.output_delay();
    let wanted = delay + target_len;

    let mut out = Vec::with_capacity(wanted + CHUNK);
    let mut pos = 0;

    // Full chunks
    while input.len() - pos >= resampler.input_frames_next() {
        let end = pos + resampler.input_frames_next();
        let block = [&input[pos..end]];
        let frames = resampler
            .process(&block[..], None)
            .map_err(|e| resample_error(from_rate, to_rate, e))?;
        out.extend_from_slice(&frames[0]);
        pos = end;
    }

    // Trailing partial chunk (zero-padded by rubato)
    if pos < input.len() {
        let block = [&input[pos..]];
        let frames = resampler
            .process_partial(Some(&block[..]), None)
            .map_err(|e| resample_error(from_rate, to_rate, e))?;
        out.extend_from_slice(&frames[0]);
    }

    // Flush the delay line until the tail of the signal is out
    while out.len() < wanted {
        let frames = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| resample_error(from_rate, to_rate, e))?;
        if frames[0].is_empty() {
            break;
        }
        out.extend_from_slice(&frames[0]);
    }

    out.drain(..delay.min(out.len()));
    out.resize(target_len, 0.0);
    Ok(out)
}

fn resample_error(from_rate: u32, to_rate: u32, error: impl std::fmt::Display) -> TalkGlobeError {
    TalkGlobeError::InvalidAudioInput {
        message: format!(
            "resampling {}Hz -> {}Hz failed: {}",
            from_rate, to_rate, error
        ),
    }
}
