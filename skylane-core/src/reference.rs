use rand::Rng;

/// Booking references are 8 uppercase alphanumerics, e.g. "K7KQ2MNA".
pub const REFERENCE_LEN: usize = 8;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a candidate booking reference. Uniqueness is enforced by the
/// booking store's constraint; callers retry on conflict with a fresh code.
pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERENCE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
