pub mod candle_utils;
pub mod image_utils;
pub mod tokenizer_utils;
pub mod vector_utils;
