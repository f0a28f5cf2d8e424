//! 观察入口 HTTP 服务
//!
//! 店铺页面上的注入脚本把拦截到的调用转发到这里。解析成功即返回 202，
//! 对账结果与失败都不会回传给页面。

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::engine::PassTrigger;
use crate::observer::{
    CartObserver, CartSignal, FormAdapter, NetworkAdapter, NetworkCondition, ReconcileTrigger,
    RequestAdapter,
};
use crate::progress::{LatestProgress, ProgressView};

/// 路由共享状态
///
/// 只持有观察器的三个注册点，观察循环的生命周期仍归调用方所有
#[derive(Clone)]
pub struct IngressState {
    network: NetworkAdapter,
    request: RequestAdapter,
    form: FormAdapter,
    progress: Arc<LatestProgress>,
    trigger: Arc<dyn ReconcileTrigger>,
}

impl IngressState {
    pub fn new(
        observer: &CartObserver,
        progress: Arc<LatestProgress>,
        trigger: Arc<dyn ReconcileTrigger>,
    ) -> Self {
        Self {
            network: observer.network().clone(),
            request: observer.request().clone(),
            form: observer.form().clone(),
            progress,
            trigger,
        }
    }
}

/// 网络调用与请求对象调用的上报格式
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedCall {
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub network_condition: Option<NetworkCondition>,
}

/// 表单提交的上报格式
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedForm {
    pub action: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub network_condition: Option<NetworkCondition>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObserveResponse {
    /// 识别出的信号，未识别为 null
    pub signal: Option<String>,
}

fn accepted(signal: Option<CartSignal>) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(ObserveResponse {
            signal: signal.map(|s| s.as_str().to_string()),
        }),
    )
}

pub fn router(state: IngressState) -> Router {
    Router::new()
        .route("/observe/network", post(observe_network))
        .route("/observe/request", post(observe_request))
        .route("/observe/form", post(observe_form))
        .route("/reconcile", post(reconcile))
        .route("/progress", get(progress))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn observe_network(
    State(state): State<IngressState>,
    Json(call): Json<ObservedCall>,
) -> impl IntoResponse {
    let signal = state
        .network
        .observe(&call.url, &call.method, call.network_condition.as_ref());
    accepted(signal)
}

async fn observe_request(
    State(state): State<IngressState>,
    Json(call): Json<ObservedCall>,
) -> impl IntoResponse {
    let signal = state
        .request
        .observe(&call.url, &call.method, call.network_condition.as_ref());
    accepted(signal)
}

async fn observe_form(
    State(state): State<IngressState>,
    Json(form): Json<ObservedForm>,
) -> impl IntoResponse {
    let signal = state
        .form
        .observe(&form.action, &form.method, form.network_condition.as_ref());
    accepted(signal)
}

/// 手动触发一轮对账
async fn reconcile(State(state): State<IngressState>) -> StatusCode {
    state.trigger.fire(PassTrigger::Manual);
    StatusCode::ACCEPTED
}

/// 最近一次渲染的进度，没有进度活动时为 null
async fn progress(State(state): State<IngressState>) -> Json<Option<ProgressView>> {
    Json(state.progress.latest().map(|view| view.as_ref().clone()))
}
