//! Output channel allocation.

use xs_ir::PAD_COUNT;

use crate::trigger::LiveTrigger;

/// Number of MIDI channels.
const CHANNEL_COUNT: usize = 16;

/// Lowest channel not held by a live pad, or `None` if the pool is spent.
///
/// Channels are 1-16; `reserved_channel` is never handed out.
pub fn allocate_channel(live: &[Option<LiveTrigger>; PAD_COUNT], reserved_channel: u8) -> Option<u8> {
    let mut used = [false; CHANNEL_COUNT];
    for trigger in live.iter().flatten() {
        debug_assert!((1..=CHANNEL_COUNT as u8).contains(&trigger.channel));
        if let Some(slot) = used.get_mut(trigger.channel as usize - 1) {
            *slot = true;
        }
    }
    if let Some(slot) = used.get_mut((reserved_channel as usize).wrapping_sub(1)) {
        *slot = true;
    }

    used.iter().position(|&u| !u).map(|i| i as u8 + 1)
}
