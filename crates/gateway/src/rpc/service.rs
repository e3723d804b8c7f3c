//! `AgentService` (§4.9): the single `tonic`-generated trait implementation,
//! wired to a shared `AppState`. This is the one place in the crate that
//! translates gRPC request/response shapes into graph traversals.

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use agentd_domain::error::Error as DomainError;
use agentd_domain::message::Role;
use agentd_domain::state::ConversationState;
use agentd_domain::trace::TraceEvent;
use agentd_sessions::{is_valid_identifier, CancelHandle, ThreadKey};

use crate::auth::Identity;
use crate::graph::{self, Collaborators, GraphContext, GraphResult, ResumeAnswer, Stage, StageOutcome};
use crate::state::AppState;
use crate::status::to_status;

use super::pb;

pub struct AgentServiceImpl {
    state: Arc<AppState>,
}

impl AgentServiceImpl {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

fn resolve_user_id(identity: Option<Identity>, fallback: String) -> String {
    identity.map(|i| i.user_id).unwrap_or(fallback)
}

fn validate_identifiers(user_id: &str, thread_id: &str) -> Result<(), Status> {
    if !is_valid_identifier(user_id) || !is_valid_identifier(thread_id) {
        return Err(Status::invalid_argument("user_id and thread_id must match [A-Za-z0-9_-]{1,64}"));
    }
    Ok(())
}

/// Match the approval answer to its pending store entry by thread key, per
/// the single-threaded-per-thread execution invariant (§9 "resume protocol"
/// decision) — the wire protocol carries no `approval_id`. `resolve` is
/// called purely to remove the bookkeeping entry; the oneshot it signals is
/// already orphaned (the Tools stage dropped its receiver on suspend).
fn resolve_approval(state: &AppState, key: &ThreadKey, approval: Option<pb::ApprovalAnswer>) -> Option<ResumeAnswer> {
    let approval = approval?;
    let canonical = key.as_canonical();
    if let Some(info) = state.approvals().list_pending().into_iter().find(|i| i.thread_key == canonical) {
        state.approvals().resolve(&info.id, &approval.answer, approval.reason.clone());
    }
    Some(ResumeAnswer { answer: approval.answer, reason: approval.reason })
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

impl AgentServiceImpl {
    async fn run_once(
        &self,
        key: &ThreadKey,
        handle: Arc<CancelHandle>,
        user_input: String,
        approval: Option<pb::ApprovalAnswer>,
    ) -> Result<GraphResult, DomainError> {
        let state = self.state.checkpoints.load(&key.thread_id)?.unwrap_or_default();
        let resume = resolve_approval(&self.state, key, approval);
        let user_input = if resume.is_some() || user_input.trim().is_empty() { None } else { Some(user_input) };

        let ctx = GraphContext {
            user_id: key.user_id.clone(),
            thread_id: key.thread_id.clone(),
            cancel: handle,
            checkpoints: self.state.checkpoints.clone(),
            profiles: self.state.profiles.clone(),
            user_input,
            resume,
        };

        graph::run_graph(state, &self.state.collab, &ctx).await
    }
}

/// The `ChatStream` analogue of `graph::run_graph`: the same dispatch loop,
/// re-run here because streaming needs a chunk emitted after every stage
/// rather than only the terminal outcome.
async fn drive_stream(
    app: Arc<AppState>,
    key: ThreadKey,
    handle: Arc<CancelHandle>,
    user_input: String,
    approval: Option<pb::ApprovalAnswer>,
    tx: mpsc::Sender<Result<pb::ChatStreamChunk, Status>>,
) {
    let result = run_stream_inner(&app, &key, handle, user_input, approval, &tx).await;
    if let Err(e) = result {
        let _ = tx.send(Err(to_status(e))).await;
    }
}

async fn run_stream_inner(
    app: &Arc<AppState>,
    key: &ThreadKey,
    handle: Arc<CancelHandle>,
    user_input: String,
    approval: Option<pb::ApprovalAnswer>,
    tx: &mpsc::Sender<Result<pb::ChatStreamChunk, Status>>,
) -> Result<(), DomainError> {
    let mut state: ConversationState = app.checkpoints.load(&key.thread_id)?.unwrap_or_default();
    let resume = resolve_approval(app, key, approval);
    let input = if resume.is_some() || user_input.trim().is_empty() { None } else { Some(user_input) };

    let ctx = GraphContext {
        user_id: key.user_id.clone(),
        thread_id: key.thread_id.clone(),
        cancel: handle,
        checkpoints: app.checkpoints.clone(),
        profiles: app.profiles.clone(),
        user_input: input,
        resume,
    };
    let collab: &Collaborators = &app.collab;

    let mut stage = if ctx.resume.is_some() { Stage::Tools } else { Stage::Summarize };
    let request_id = Uuid::new_v4().to_string();

    loop {
        if ctx.cancel.is_cancelled() {
            TraceEvent::SessionCancelled { thread_key: ctx.thread_id.clone(), request_id }.emit();
            let _ = tx
                .send(Ok(pb::ChatStreamChunk {
                    output: "task cancelled".to_string(),
                    final_response: true,
                    node_name: stage.label().to_string(),
                    token: 0,
                }))
                .await;
            return Ok(());
        }

        TraceEvent::StageEntered { thread_key: ctx.thread_id.clone(), stage: stage.label().to_string(), loop_count: state.loop_count }.emit();
        let stage_started = std::time::Instant::now();
        let usage_before = state.usage.total;
        let outcome = graph::dispatch(stage, &mut state, collab, &ctx).await?;
        let delta = state.usage.total.saturating_sub(usage_before);
        TraceEvent::StageCompleted {
            thread_key: ctx.thread_id.clone(),
            stage: stage.label().to_string(),
            status: format!("{:?}", state.step_status),
            duration_ms: stage_started.elapsed().as_millis() as u64,
        }
        .emit();

        let checkpoint_bytes = ctx.checkpoints.save(&ctx.thread_id, &state)?;
        TraceEvent::CheckpointWritten { thread_key: ctx.thread_id.clone(), stage: stage.label().to_string(), bytes: checkpoint_bytes }.emit();

        match outcome {
            StageOutcome::Next(next) => {
                let _ = tx
                    .send(Ok(pb::ChatStreamChunk {
                        output: stage.label().to_string(),
                        final_response: false,
                        node_name: stage.label().to_string(),
                        token: delta as u32,
                    }))
                    .await;
                stage = next;
            }
            StageOutcome::Finished { reply } => {
                let _ = tx
                    .send(Ok(pb::ChatStreamChunk {
                        output: reply,
                        final_response: true,
                        node_name: stage.label().to_string(),
                        token: state.usage.total as u32,
                    }))
                    .await;
                return Ok(());
            }
            StageOutcome::AwaitingApproval { approval_id } => {
                let _ = tx
                    .send(Ok(pb::ChatStreamChunk {
                        output: format!("awaiting approval {approval_id}"),
                        final_response: true,
                        node_name: stage.label().to_string(),
                        token: state.usage.total as u32,
                    }))
                    .await;
                return Ok(());
            }
        }
    }
}

type BoxChatStream = Pin<Box<dyn Stream<Item = Result<pb::ChatStreamChunk, Status>> + Send + 'static>>;

impl pb::agent_service_server::AgentService for AgentServiceImpl {
    async fn chat(&self, request: Request<pb::ChatRequest>) -> Result<Response<pb::ChatResponse>, Status> {
        let identity = request.extensions().get::<Identity>().cloned();
        let req = request.into_inner();
        let user_config = req.user_config.ok_or_else(|| Status::invalid_argument("user_config is required"))?;
        let user_id = resolve_user_id(identity, user_config.user_id);
        validate_identifiers(&user_id, &user_config.thread_id)?;

        let key = ThreadKey::new(user_id, user_config.thread_id);
        let handle = CancelHandle::new();
        self.state.sessions.register(key.clone(), handle.clone());

        let result = self.run_once(&key, handle.clone(), req.user_input, req.approval).await;
        self.state.sessions.unregister(&key, &handle);

        match result {
            Ok(GraphResult::Completed { reply, usage }) => {
                Ok(Response::new(pb::ChatResponse { reply, token_usage: usage.total, success: true, error: String::new() }))
            }
            // A cooperative cancellation is not a failure of the request; it
            // reflects the newer request that superseded it (§5).
            Ok(GraphResult::Cancelled) => Ok(Response::new(pb::ChatResponse {
                reply: "task cancelled".to_string(),
                token_usage: 0,
                success: true,
                error: String::new(),
            })),
            Ok(GraphResult::AwaitingApproval { approval_id }) => {
                let tool_names = self
                    .state
                    .approvals()
                    .list_pending()
                    .into_iter()
                    .find(|i| i.id == approval_id)
                    .map(|i| i.tool_names.join(", "))
                    .unwrap_or_default();
                Ok(Response::new(pb::ChatResponse {
                    reply: format!("Approval required for: {tool_names}. Resend Chat with `approval` set to continue."),
                    token_usage: 0,
                    success: true,
                    error: String::new(),
                }))
            }
            Err(e) => Err(to_status(e)),
        }
    }

    type ChatStreamStream = BoxChatStream;

    async fn chat_stream(&self, request: Request<pb::ChatRequest>) -> Result<Response<Self::ChatStreamStream>, Status> {
        let identity = request.extensions().get::<Identity>().cloned();
        let req = request.into_inner();
        let user_config = req.user_config.ok_or_else(|| Status::invalid_argument("user_config is required"))?;
        let user_id = resolve_user_id(identity, user_config.user_id);
        validate_identifiers(&user_id, &user_config.thread_id)?;

        let key = ThreadKey::new(user_id, user_config.thread_id);
        let handle = CancelHandle::new();
        self.state.sessions.register(key.clone(), handle.clone());

        let (tx, rx) = mpsc::channel(16);
        let app = self.state.clone();
        let stream_key = key.clone();
        let stream_handle = handle.clone();
        tokio::spawn(async move {
            drive_stream(app.clone(), stream_key.clone(), stream_handle.clone(), req.user_input, req.approval, tx).await;
            app.sessions.unregister(&stream_key, &stream_handle);
        });

        let stream: BoxChatStream = Box::pin(ReceiverStream::new(rx));
        Ok(Response::new(stream))
    }

    async fn get_conversation_history(&self, request: Request<pb::HistoryRequest>) -> Result<Response<pb::HistoryResponse>, Status> {
        let identity = request.extensions().get::<Identity>().cloned();
        let req = request.into_inner();
        let user_config = req.user_config.ok_or_else(|| Status::invalid_argument("user_config is required"))?;
        let user_id = resolve_user_id(identity, user_config.user_id);
        validate_identifiers(&user_id, &user_config.thread_id)?;

        let loaded = self
            .state
            .checkpoints
            .load(&user_config.thread_id)
            .map_err(|e| to_status(DomainError::from(e)))?;

        let Some(state) = loaded else {
            return Ok(Response::new(pb::HistoryResponse { pairs: Vec::new(), cumulative_usage: 0, summary: String::new() }));
        };

        let pairs = state
            .recent_pairs
            .iter()
            .map(|m| pb::HistoryPair { role: role_label(m.role).to_string(), content: m.content.clone(), timestamp: 0 })
            .collect();

        Ok(Response::new(pb::HistoryResponse {
            pairs,
            cumulative_usage: state.usage.total,
            summary: state.context.get("summary").cloned().unwrap_or_default(),
        }))
    }

    async fn cancel_task(&self, request: Request<pb::CancelTaskRequest>) -> Result<Response<pb::CancelTaskResponse>, Status> {
        let identity = request.extensions().get::<Identity>().cloned();
        let req = request.into_inner();
        let user_id = resolve_user_id(identity, req.user_id);
        validate_identifiers(&user_id, &req.thread_id)?;

        let key = ThreadKey::new(user_id, req.thread_id);
        let found = self.state.sessions.cancel(&key);
        Ok(Response::new(pb::CancelTaskResponse {
            success: found,
            message: if found { "cancellation requested".to_string() } else { "no active task for this thread".to_string() },
        }))
    }

    async fn get_server_info(&self, _request: Request<pb::ServerInfoRequest>) -> Result<Response<pb::ServerInfoResponse>, Status> {
        Ok(Response::new(pb::ServerInfoResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: self.state.started_wall.timestamp(),
            run_time_secs: self.state.started_at.elapsed().as_secs() as i64,
        }))
    }
}
