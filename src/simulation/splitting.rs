//! Splitting of the fields arriving at a station into causally independent
//! sub-events.

use super::{field::ChannelFieldSample, fsi};
use crate::num;
use log::info;

/// Field samples of one station that are close enough in time to be read
/// out together.
#[derive(Clone, Debug)]
pub struct SubEvent {
    /// Sequential id of the sub-event within its event group and station.
    pub sub_event_id: i64,
    /// Input rows of the showers contributing to the sub-event, in order of
    /// first appearance.
    pub shower_indices: Vec<usize>,
    /// Member samples, sorted by trace start time.
    pub samples: Vec<ChannelFieldSample>,
}

impl SubEvent {
    /// Time of the earliest trace start [ns].
    pub fn start_time(&self) -> fsi {
        self.samples
            .first()
            .map_or(fsi::NAN, |sample| sample.trace_start_time)
    }
}

/// Partitions the given samples into sub-events.
///
/// Samples are ordered by trace start time, and a new sub-event is started
/// wherever the gap to the previous sample exceeds `split_event_time_diff`.
/// Every sample ends up in exactly one sub-event.
pub fn split_into_sub_events(
    samples: Vec<ChannelFieldSample>,
    split_event_time_diff: fsi,
) -> Vec<SubEvent> {
    if samples.is_empty() {
        return Vec::new();
    }
    let start_times: Vec<_> = samples
        .iter()
        .map(|sample| sample.trace_start_time)
        .collect();
    let order = num::argsort(&start_times);

    let mut slots: Vec<_> = samples.into_iter().map(Some).collect();
    let mut sub_events: Vec<SubEvent> = Vec::new();
    let mut previous_time: Option<fsi> = None;

    for idx in order {
        let time = start_times[idx];
        let starts_new = match previous_time {
            None => true,
            Some(previous) => time - previous > split_event_time_diff,
        };
        if starts_new {
            sub_events.push(SubEvent {
                sub_event_id: sub_events.len() as i64,
                shower_indices: Vec::new(),
                samples: Vec::new(),
            });
        }
        previous_time = Some(time);

        if let (Some(sample), Some(sub_event)) = (slots[idx].take(), sub_events.last_mut()) {
            if !sub_event.shower_indices.contains(&sample.shower_idx) {
                sub_event.shower_indices.push(sample.shower_idx);
            }
            sub_event.samples.push(sample);
        }
    }
    if sub_events.len() > 1 {
        info!("Splitting into {} sub-events", sub_events.len());
    }
    sub_events
}
