/// Split text into whitespace-delimited chunks of roughly `chunk_size` characters.
///
/// Words are packed greedily left to right. Every packed word is charged its
/// length plus one separator, and a chunk is closed as soon as the next word
/// would push that running total past `chunk_size`. A single word longer than
/// `chunk_size` still becomes its own chunk; words are never split.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count() + 1;

        if current_len + word_len > chunk_size && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
        current.push(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}
