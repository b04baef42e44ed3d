/// Constants used by corpus enumeration and record selection.
pub mod picker {
    /// Record boundary: a line containing only `%`.
    pub const RECORD_DELIMITER: &[u8] = b"\n%\n";
    /// Opening marker accepted only at the first byte of a file.
    pub const LEADING_DELIMITER: &[u8] = b"%\n";
    /// Suffix of the sibling index file that marks a file as a fortune database.
    pub const MARKER_SUFFIX: &str = ".dat";
    /// Maximum number of offset draws per `pick` call.
    pub const MAX_ATTEMPTS: usize = 10;
    /// Lookahead chunk is `LOOKAHEAD_MULTIPLIER * max_length` bytes...
    pub const LOOKAHEAD_MULTIPLIER: usize = 10;
    /// ...capped at this many bytes regardless of `max_length`.
    pub const LOOKAHEAD_CEILING: usize = 1024 * 1024;
    /// Default maximum record length, in bytes.
    pub const DEFAULT_MAX_LENGTH: usize = 1000;
    /// Default corpus location on Debian-style systems.
    pub const DEFAULT_FORTUNES_DIR: &str = "/usr/share/games/fortunes";
    /// Log message used when an enumerated file cannot be opened.
    pub const SKIP_UNREADABLE_MSG: &str = "skipping unreadable fortune file";
}

/// Constants used by the image generation loop.
pub mod canvas {
    /// Name of the link pointing at the most recent image.
    pub const LATEST_LINK_NAME: &str = "latest.png";
    /// Required extension of generated image files.
    pub const IMAGE_EXTENSION: &str = "png";
    /// Default pause between successful generations, in seconds.
    pub const DEFAULT_SLEEP_SECS: u64 = 200;
    /// Pause after a missing prompt or rejected image, in seconds.
    pub const RETRY_BACKOFF_SECS: u64 = 1;
    /// Default model id recorded in image metadata.
    pub const DEFAULT_MODEL_ID: &str = "runwayml/stable-diffusion-v1-5";
    /// Metadata keyword holding the generation prompt.
    pub const META_KEY_PROMPT: &str = "prompt";
    /// Metadata keyword holding the model id.
    pub const META_KEY_MODEL_ID: &str = "model_id";
    /// Images with at most this many non-empty histogram bins count as blank.
    pub const BLANK_MAX_HISTOGRAM_BINS: usize = 10;
}

/// Constants used by PNG chunk encoding.
pub mod png {
    /// Eight-byte PNG file signature.
    pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    /// Header chunk; must come first.
    pub const CHUNK_IHDR: [u8; 4] = *b"IHDR";
    /// Trailer chunk; text chunks are inserted before it.
    pub const CHUNK_IEND: [u8; 4] = *b"IEND";
    /// Latin-1 text chunk.
    pub const CHUNK_TEXT: [u8; 4] = *b"tEXt";
    /// International (UTF-8) text chunk.
    pub const CHUNK_ITXT: [u8; 4] = *b"iTXt";
    /// Compressed image data chunk.
    pub const CHUNK_IDAT: [u8; 4] = *b"IDAT";
    /// Maximum keyword length permitted by the PNG specification.
    pub const MAX_KEYWORD_LEN: usize = 79;
    /// Adam7 passes as `(x0, y0, dx, dy)`.
    pub const ADAM7_PASSES: [(usize, usize, usize, usize); 7] = [
        (0, 0, 8, 8),
        (4, 0, 8, 8),
        (0, 4, 4, 8),
        (2, 0, 4, 4),
        (0, 2, 2, 4),
        (1, 0, 2, 2),
        (0, 1, 1, 2),
    ];
}
