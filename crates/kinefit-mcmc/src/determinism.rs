use kinefit_core::derive_substream_seed;

const SAMPLER_STREAM: u64 = 1;
const NOISE_STREAM: u64 = 2;

/// Seed of the random walk (proposals and acceptance draws).
pub fn sampler_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, SAMPLER_STREAM)
}

/// Seed of the noise added to synthetic cubes.
pub fn noise_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, NOISE_STREAM)
}
