use rns_core::derive_substream_seed;

/// Derives the seed used to draw the initial prior sample for a live slot.
pub fn init_seed(master_seed: u64, slot: usize) -> u64 {
    derive_substream_seed(master_seed ^ 0x1111_1111_1111_1111, slot as u64)
}

/// Derives the seed for a proposal batch issued during a round.
pub fn proposal_seed(master_seed: u64, round: usize, batch: usize) -> u64 {
    let intermediate = derive_substream_seed(master_seed, round as u64);
    derive_substream_seed(intermediate, batch as u64)
}

/// Derives the seed for a reactive injection batch.
pub fn injection_seed(master_seed: u64, round: usize, batch: usize) -> u64 {
    derive_substream_seed(
        master_seed ^ 0xA5A5_A5A5_A5A5_A5A5,
        (round as u64) << 16 | batch as u64,
    )
}

/// Derives the seed for a bootstrap replicate.
pub fn bootstrap_seed(master_seed: u64, replicate: usize) -> u64 {
    derive_substream_seed(master_seed ^ 0x5151_5151_5151_5151, replicate as u64)
}

/// Derives the seed used for pre-run user-function validation draws.
pub fn validation_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed ^ 0x7E57_7E57_7E57_7E57, 0)
}
