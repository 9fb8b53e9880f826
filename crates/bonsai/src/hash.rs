pub fn content_hash(src: &[u8]) -> String {
    // webpack uses md4; md5 keeps the same stability/cheapness trade-off
    let digest = md5::compute(src);
    format!("{:x}", digest)
}

pub fn content_hash_with_len(src: &[u8], len: usize) -> String {
    let hash = content_hash(src);
    hash[..len].to_string()
}
