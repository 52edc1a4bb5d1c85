//! In-memory stand-ins for every external seam of `AppState`, plus request helpers.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    auth::{
        google::{GoogleIdentity, IdentityVerifier},
        jwt::JwtKeys,
        password::hash_password,
        repo::UserRepo,
        repo_types::{AuthProvider, AuthProviders, NewUser, User},
    },
    config::{AppConfig, JwtConfig, StorageConfig, UploadConfig},
    email::Mailer,
    error::AppError,
    history::repo::HistoryRepo,
    history::repo_types::{History, HistoryFeedback, NewHistory},
    inference::{Classification, Classifier, InferenceError, Prediction},
    newsletter::Newsletter,
    state::AppState,
    storage::{StorageClient, StoredObject},
    user::repo::{Feedback, FeedbackRepo},
};

pub const TEST_UPLOAD_MAX_BYTES: usize = 16 * 1024;

pub fn test_config(upload_dir: PathBuf) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "postgres://unused".into(),
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "optiguard".into(),
            audience: "optiguard-users".into(),
            ttl_minutes: 60,
        },
        storage: StorageConfig {
            endpoint: "http://storage.test".into(),
            bucket: "optiguard".into(),
            access_key: "key".into(),
            secret_key: "secret".into(),
            region: "us-east-1".into(),
            public_url: "http://storage.test".into(),
        },
        upload: UploadConfig {
            dir: upload_dir,
            max_bytes: TEST_UPLOAD_MAX_BYTES,
        },
        inference_url: "http://inference.test/upload".into(),
        frontend_url: "http://localhost:5173".into(),
        cors_origins: Vec::new(),
        smtp: None,
        contact_inbox: "support@optiguard.test".into(),
        mailchimp: None,
        google_client_id: None,
    }
}

/// A user with a verified local binding. The hash is not a real one.
pub fn sample_user(email: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: "Sample User".into(),
        is_verified: true,
        providers: AuthProviders::single(AuthProvider::Local {
            email: email.to_string(),
            password_hash: "not-a-hash".into(),
            verified: true,
        }),
        profile_picture: None,
        verification_otp: None,
        password_reset: None,
        created_at: now,
        updated_at: now,
    }
}

// --- users ---

#[derive(Default)]
pub struct InMemoryUsers {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUsers {
    pub fn get(&self, id: Uuid) -> Option<User> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut User)) {
        let mut rows = self.rows.lock().unwrap();
        f(rows.get_mut(&id).expect("user exists"));
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.rows.lock().unwrap().values().find(|&u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserRepo for InMemoryUsers {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.email == email))
    }

    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.password_reset.as_ref().is_some_and(|r| r.value == token)))
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        anyhow::ensure!(!new.providers.is_empty(), "user needs an auth provider");
        anyhow::ensure!(
            self.find(|u| u.email == new.email).is_none(),
            "duplicate email {}",
            new.email
        );
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            is_verified: new.is_verified,
            providers: new.providers,
            profile_picture: new.profile_picture,
            verification_otp: new.verification_otp,
            password_reset: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().unwrap();
        anyhow::ensure!(rows.contains_key(&user.id), "no user {}", user.id);
        let mut user = user.clone();
        user.updated_at = OffsetDateTime::now_utc();
        rows.insert(user.id, user);
        Ok(())
    }
}

// --- history ---

#[derive(Default)]
pub struct InMemoryHistory {
    rows: Mutex<Vec<History>>,
    fail_inserts: AtomicBool,
}

impl InMemoryHistory {
    pub async fn seed(&self, user_id: Uuid, class: &str, key: Option<&str>) -> History {
        self.insert(NewHistory {
            user_id,
            image_url: format!("http://storage.test/optiguard/{}", key.unwrap_or("none")),
            storage_key: key.map(str::to_string),
            result: Prediction {
                predicted_class: class.to_string(),
                severity: None,
            },
        })
        .await
        .unwrap()
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, id: Uuid) -> Option<History> {
        self.rows.lock().unwrap().iter().find(|h| h.id == id).cloned()
    }

    pub fn count_for(&self, user_id: Uuid) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl HistoryRepo for InMemoryHistory {
    async fn insert(&self, item: NewHistory) -> anyhow::Result<History> {
        anyhow::ensure!(!self.fail_inserts.load(Ordering::SeqCst), "database unavailable");
        let row = History {
            id: Uuid::new_v4(),
            user_id: item.user_id,
            image_url: item.image_url,
            storage_key: item.storage_key,
            result: item.result,
            feedback: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<History>> {
        let mut out: Vec<History> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<History>> {
        Ok(self.get(id))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        self.rows.lock().unwrap().retain(|h| h.id != id);
        Ok(())
    }

    async fn set_feedback(&self, id: Uuid, feedback: HistoryFeedback) -> anyhow::Result<History> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| anyhow::anyhow!("no history {id}"))?;
        row.feedback = Some(feedback);
        Ok(row.clone())
    }
}

// --- product feedback ---

#[derive(Default)]
pub struct InMemoryFeedback {
    rows: Mutex<Vec<Feedback>>,
}

impl InMemoryFeedback {
    pub fn all(&self) -> Vec<Feedback> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackRepo for InMemoryFeedback {
    async fn insert(&self, user_id: Uuid, rating: u8, message: &str) -> anyhow::Result<Feedback> {
        let row = Feedback {
            id: Uuid::new_v4(),
            user_id,
            rating,
            message: message.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }
}

// --- object storage ---

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    deleted: Mutex<Vec<String>>,
    fail_puts: AtomicBool,
    undeletable: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes_of(&self, key: &str) {
        self.undeletable.lock().unwrap().push(key.to_string());
    }

    pub fn stored(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> anyhow::Result<StoredObject> {
        anyhow::ensure!(!self.fail_puts.load(Ordering::SeqCst), "storage unavailable");
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("http://storage.test/optiguard/{key}"),
        })
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.undeletable.lock().unwrap().iter().any(|k| k == key),
            "delete {key} refused"
        );
        self.objects.lock().unwrap().remove(key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

// --- classifier ---

#[derive(Debug, Clone)]
enum Verdict {
    Predict(String),
    Reject(String),
    Fail(StatusCode, String),
}

pub struct FakeClassifier {
    verdict: Mutex<Verdict>,
    last_file_name: Mutex<Option<String>>,
}

impl Default for FakeClassifier {
    fn default() -> Self {
        Self {
            verdict: Mutex::new(Verdict::Predict("Normal".into())),
            last_file_name: Mutex::new(None),
        }
    }
}

impl FakeClassifier {
    pub fn predict(&self, class: &str) {
        *self.verdict.lock().unwrap() = Verdict::Predict(class.to_string());
    }

    pub fn reject(&self, message: &str) {
        *self.verdict.lock().unwrap() = Verdict::Reject(message.to_string());
    }

    pub fn fail_with(&self, status: StatusCode, message: &str) {
        *self.verdict.lock().unwrap() = Verdict::Fail(status, message.to_string());
    }

    pub fn last_file_name(&self) -> Option<String> {
        self.last_file_name.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(
        &self,
        image: &Path,
        file_name: &str,
        _content_type: &str,
    ) -> Result<Classification, InferenceError> {
        // The real client streams the file, so it must exist at this point.
        tokio::fs::metadata(image).await?;
        *self.last_file_name.lock().unwrap() = Some(file_name.to_string());

        let verdict = self.verdict.lock().unwrap().clone();
        match verdict {
            Verdict::Predict(class) => Ok(Classification::Predicted(Prediction {
                predicted_class: class,
                severity: None,
            })),
            Verdict::Reject(message) => Ok(Classification::Rejected { message }),
            Verdict::Fail(status, message) => Err(InferenceError::Status { status, message }),
        }
    }
}

// --- mail ---

#[derive(Debug, Clone)]
enum Sent {
    Verification { to: String, otp: String },
    Reset { to: String, link: String },
    Contact { name: String, from: String, message: String },
    Feedback { from: String, rating: u8, message: String },
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMailer {
    pub fn last_otp(&self, email: &str) -> Option<String> {
        self.sent.lock().unwrap().iter().rev().find_map(|m| match m {
            Sent::Verification { to, otp } if to == email => Some(otp.clone()),
            _ => None,
        })
    }

    pub fn last_reset_link(&self, email: &str) -> Option<String> {
        self.sent.lock().unwrap().iter().rev().find_map(|m| match m {
            Sent::Reset { to, link } if to == email => Some(link.clone()),
            _ => None,
        })
    }

    /// Mails addressed to the user (verification and reset).
    pub fn sent_to(&self, email: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| match m {
                Sent::Verification { to, .. } | Sent::Reset { to, .. } => to == email,
                _ => false,
            })
            .count()
    }

    pub fn contacts(&self) -> Vec<(String, String, String)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                Sent::Contact {
                    name,
                    from,
                    message,
                } => Some((name.clone(), from.clone(), message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn feedbacks(&self) -> Vec<(String, u8, String)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                Sent::Feedback {
                    from,
                    rating,
                    message,
                } => Some((from.clone(), *rating, message.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(&self, mail: Sent) {
        self.sent.lock().unwrap().push(mail);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn verify(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_verification(&self, to: &str, otp: &str) -> anyhow::Result<()> {
        self.record(Sent::Verification {
            to: to.to_string(),
            otp: otp.to_string(),
        });
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, reset_link: &str) -> anyhow::Result<()> {
        self.record(Sent::Reset {
            to: to.to_string(),
            link: reset_link.to_string(),
        });
        Ok(())
    }

    async fn send_contact(&self, name: &str, from: &str, message: &str) -> anyhow::Result<()> {
        self.record(Sent::Contact {
            name: name.to_string(),
            from: from.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn send_feedback(&self, from: &str, rating: u8, message: &str) -> anyhow::Result<()> {
        self.record(Sent::Feedback {
            from: from.to_string(),
            rating,
            message: message.to_string(),
        });
        Ok(())
    }
}

// --- google ---

#[derive(Default)]
pub struct FakeGoogle {
    tokens: Mutex<HashMap<String, GoogleIdentity>>,
}

impl FakeGoogle {
    pub fn accept(&self, token: &str, sub: &str, email: &str, name: Option<&str>) {
        self.tokens.lock().unwrap().insert(
            token.to_string(),
            GoogleIdentity {
                sub: sub.to_string(),
                email: email.to_string(),
                name: name.map(str::to_string),
                picture: None,
            },
        );
    }
}

#[async_trait]
impl IdentityVerifier for FakeGoogle {
    async fn verify(&self, id_token: &str) -> anyhow::Result<Option<GoogleIdentity>> {
        Ok(self.tokens.lock().unwrap().get(id_token).cloned())
    }
}

// --- newsletter ---

#[derive(Default)]
pub struct FakeNewsletter {
    subscribed: Mutex<Vec<String>>,
}

impl FakeNewsletter {
    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Newsletter for FakeNewsletter {
    async fn subscribe(&self, email: &str) -> Result<Value, AppError> {
        self.subscribed.lock().unwrap().push(email.to_string());
        Ok(json!({ "email_address": email, "status": "subscribed" }))
    }
}

// --- wiring ---

pub struct TestContext {
    pub state: AppState,
    pub users: Arc<InMemoryUsers>,
    pub history: Arc<InMemoryHistory>,
    pub feedback: Arc<InMemoryFeedback>,
    pub storage: Arc<FakeStorage>,
    pub classifier: Arc<FakeClassifier>,
    pub mailer: Arc<RecordingMailer>,
    pub google: Arc<FakeGoogle>,
    pub newsletter: Arc<FakeNewsletter>,
    upload_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let upload_dir = tempfile::tempdir().expect("create upload dir");
        let users = Arc::new(InMemoryUsers::default());
        let history = Arc::new(InMemoryHistory::default());
        let feedback = Arc::new(InMemoryFeedback::default());
        let storage = Arc::new(FakeStorage::default());
        let classifier = Arc::new(FakeClassifier::default());
        let mailer = Arc::new(RecordingMailer::default());
        let google = Arc::new(FakeGoogle::default());
        let newsletter = Arc::new(FakeNewsletter::default());

        let state = AppState {
            config: Arc::new(test_config(upload_dir.path().to_path_buf())),
            users: users.clone(),
            history: history.clone(),
            feedback: feedback.clone(),
            storage: storage.clone(),
            classifier: classifier.clone(),
            mailer: mailer.clone(),
            newsletter: Some(newsletter.clone()),
            google: Some(google.clone()),
        };

        Self {
            state,
            users,
            history,
            feedback,
            storage,
            classifier,
            mailer,
            google,
            newsletter,
            upload_dir,
        }
    }

    pub fn app(&self) -> Router {
        crate::app::build_app(self.state.clone())
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        JwtKeys::from(&self.state.config.jwt)
            .sign(user_id)
            .expect("sign test token")
    }

    /// Inserts a fully verified local account and returns its id.
    pub async fn verified_user(&self, email: &str, password: &str) -> Uuid {
        let hash = hash_password(password).expect("hash");
        self.users
            .create(NewUser {
                email: email.to_string(),
                name: "Test User".into(),
                is_verified: true,
                providers: AuthProviders::single(AuthProvider::Local {
                    email: email.to_string(),
                    password_hash: hash,
                    verified: true,
                }),
                profile_picture: None,
                verification_otp: None,
            })
            .await
            .expect("create user")
            .id
    }

    /// Files left in the upload directory.
    pub fn temp_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path())
            .expect("read upload dir")
            .count()
    }
}

fn request(method: &str, path: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut req = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    req
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.expect("router is infallible");
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn send(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let req = request(method, path, token);
    let req = match body {
        Some(json) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("build request");
    call(app, req).await
}

pub async fn send_multipart(
    app: &Router,
    path: &str,
    token: Option<&str>,
    field: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> (StatusCode, Value) {
    const BOUNDARY: &str = "optiguard-test-boundary";
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let req = request("POST", path, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build request");
    call(app, req).await
}
