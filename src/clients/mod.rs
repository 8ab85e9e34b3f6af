pub mod vision_client;

pub use vision_client::VisionClient;
