use serde::{Deserialize, Serialize};
use session_flow::SerializableMessage;

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub session_id: String,
    pub file_name: String,
    pub doc_id: String,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub file_name: String,
    pub path: String,
    pub document_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub session_id: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: String,
    pub documents: Vec<String>,
    pub processing: bool,
    pub message_count: usize,
    pub has_query_engine: bool,
    pub active_document: Option<String>,
    pub status_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    pub session_id: String,
    pub messages: Vec<SerializableMessage>,
}
