//! Canned vendor responses shaped like the real APIs.

use serde_json::{json, Value};

use crate::http::HttpResponse;

/// `POST v2/video/generate` accepted.
#[must_use]
pub fn heygen_video_submitted(video_id: &str) -> HttpResponse {
    HttpResponse::json(200, &json!({"error": null, "data": {"video_id": video_id}}))
}

/// Body of `GET v1/video_status.get`.
#[must_use]
pub fn heygen_video_status_body(status: &str, video_url: Option<&str>) -> Value {
    let mut data = json!({"status": status});
    if let Some(url) = video_url {
        data["video_url"] = json!(url);
    }
    json!({"code": 100, "data": data})
}

/// `GET v1/video_status.get` response.
#[must_use]
pub fn heygen_video_status(status: &str, video_url: Option<&str>) -> HttpResponse {
    HttpResponse::json(200, &heygen_video_status_body(status, video_url))
}

/// `POST upload.heygen.com/v1/asset` accepted as an image.
#[must_use]
pub fn heygen_upload_ok(image_key: &str) -> HttpResponse {
    HttpResponse::json(
        200,
        &json!({"code": 100, "data": {"image_key": image_key, "file_type": "image"}}),
    )
}

/// `POST v2/photo_avatar/avatar_group/create` accepted.
#[must_use]
pub fn heygen_group_created(group_id: &str) -> HttpResponse {
    HttpResponse::json(200, &json!({"error": null, "data": {"group_id": group_id}}))
}

/// `GET v2/avatar_group/{id}/avatars` listing `(look id, status)` pairs.
#[must_use]
pub fn heygen_looks(looks: &[(&str, &str)]) -> HttpResponse {
    let avatar_list: Vec<Value> = looks
        .iter()
        .map(|(id, status)| json!({"id": id, "status": status}))
        .collect();
    HttpResponse::json(200, &json!({"error": null, "data": {"avatar_list": avatar_list}}))
}

/// `DELETE` confirmed.
#[must_use]
pub fn heygen_delete_ok() -> HttpResponse {
    HttpResponse::json(200, &json!({"code": 0, "message": "Success"}))
}

/// `POST v1/voice` accepted.
#[must_use]
pub fn heygen_voice_cloned(voice_id: &str) -> HttpResponse {
    HttpResponse::json(200, &json!({"error": null, "data": {"voice_id": voice_id}}))
}

/// `POST v2/photo_avatar/train` accepted.
#[must_use]
pub fn heygen_training_submitted(job_id: &str) -> HttpResponse {
    HttpResponse::json(200, &json!({"error": null, "data": {"job_id": job_id}}))
}

/// `GET v2/photo_avatar/train/status/{id}` response.
#[must_use]
pub fn heygen_training_status(status: &str, error: Option<&str>) -> HttpResponse {
    let mut data = json!({"status": status});
    if let Some(message) = error {
        data["error"] = json!({"message": message});
    }
    HttpResponse::json(200, &json!({"error": null, "data": data}))
}

/// `POST templates/render` queued.
#[must_use]
pub fn shotstack_render_queued(render_id: &str) -> HttpResponse {
    HttpResponse::json(
        200,
        &json!({"success": true, "message": "OK", "response": {"id": render_id, "message": "Render Successfully Queued"}}),
    )
}

/// Body of `GET render/{id}`.
#[must_use]
pub fn shotstack_status_body(status: &str, url: Option<&str>) -> Value {
    let mut response = json!({"status": status});
    if let Some(url) = url {
        response["url"] = json!(url);
    }
    json!({"success": true, "message": "OK", "response": response})
}

/// `GET render/{id}` response.
#[must_use]
pub fn shotstack_status(status: &str, url: Option<&str>) -> HttpResponse {
    HttpResponse::json(200, &shotstack_status_body(status, url))
}

/// Gemini `generateContent` answer with one text part.
#[must_use]
pub fn gemini_script(text: &str) -> HttpResponse {
    HttpResponse::json(
        200,
        &json!({"candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]}),
    )
}

/// OpenAI speech answer: a few bytes standing in for MP3 audio.
#[must_use]
pub fn openai_speech() -> HttpResponse {
    HttpResponse::new(200, vec![0x49, 0x44, 0x33, 0x04, 0x00])
}

/// Supabase storage upload accepted.
#[must_use]
pub fn supabase_uploaded(key: &str) -> HttpResponse {
    HttpResponse::json(200, &json!({"Key": key}))
}
