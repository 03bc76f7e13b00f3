//! 单飞控制 - 业务能力层
//!
//! 同一个 (操作, 参数) 在同一时刻最多只有一个请求在途。
//! 重复调用直接返回 [`Flight::Suppressed`]，不会发出第二个请求；
//! 在途标记由 [`InFlightGuard`] 持有，成功和失败路径都会释放。

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, warn};

use crate::clients::Operation;
use crate::error::{ApiError, AppResult};

/// 去重键：操作名 + 序列化后的参数，所有部分完全相同才视为同一请求
///
/// 一个阶段同时发出多个请求时，可以用多个操作组成一个键，整个阶段作为一次调用去重。
/// 文件上传的原始内容作为 `payload` 参与比较。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    operations: Vec<Operation>,
    args: String,
    payload: Option<Arc<[u8]>>,
}

impl RequestKey {
    pub fn new(operation: Operation, args: impl Into<String>) -> Self {
        Self {
            operations: vec![operation],
            args: args.into(),
            payload: None,
        }
    }

    /// 将参数序列化为 JSON 作为键
    pub fn from_args<A: Serialize + ?Sized>(operation: Operation, args: &A) -> AppResult<Self> {
        Self::combined(&[operation], args)
    }

    /// 多个操作共用一个键
    pub fn combined<A: Serialize + ?Sized>(operations: &[Operation], args: &A) -> AppResult<Self> {
        let args = serde_json::to_string(args).map_err(|e| ApiError::InvalidRequest {
            endpoint: operations
                .iter()
                .map(|op| op.path())
                .collect::<Vec<_>>()
                .join(","),
            reason: e.to_string(),
        })?;
        Ok(Self {
            operations: operations.to_vec(),
            args,
            payload: None,
        })
    }

    /// 附加原始内容（按字节比较）
    pub fn with_payload(mut self, payload: &[u8]) -> Self {
        self.payload = Some(Arc::from(payload));
        self
    }

    fn name(&self) -> String {
        self.operations
            .iter()
            .map(|op| op.name())
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// 单飞调用的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Flight<T> {
    /// 本次调用实际发出了请求并成功完成
    Completed(T),
    /// 相同请求已在途，本次调用被抑制
    Suppressed,
}

/// 单飞控制器
///
/// 对外暴露 `loading`（至少一个请求在途）和 `error`（最近一次失败的消息）
#[derive(Debug, Default)]
pub struct SingleFlight {
    in_flight: Mutex<HashSet<RequestKey>>,
    outstanding: AtomicUsize,
    last_error: Mutex<Option<String>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// 执行一次单飞调用
    ///
    /// # 参数
    /// - `key`: 去重键
    /// - `call`: 真正发起请求的闭包，只有在键不在途时才会被调用
    ///
    /// # 返回
    /// - `Ok(Flight::Completed(v))`: 请求成功
    /// - `Ok(Flight::Suppressed)`: 相同请求在途，未发起任何请求
    /// - `Err(e)`: 请求失败，错误消息同时写入 `error`
    pub async fn run<T, F, Fut>(&self, key: RequestKey, call: F) -> AppResult<Flight<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let Some(_guard) = self.acquire(key.clone()) else {
            debug!("⏭️ 相同请求已在途，忽略重复调用: {}", key.name());
            return Ok(Flight::Suppressed);
        };

        self.clear_error();
        debug!("➡️ 发起请求: {}", key.name());

        match call().await {
            Ok(value) => Ok(Flight::Completed(value)),
            Err(e) => {
                warn!("❌ 请求失败 ({}): {}", key.name(), e);
                *lock(&self.last_error) = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// 是否有请求在途
    pub fn loading(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) > 0
    }

    /// 最近一次失败的错误消息
    pub fn error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn clear_error(&self) {
        *lock(&self.last_error) = None;
    }

    fn acquire(&self, key: RequestKey) -> Option<InFlightGuard<'_>> {
        if !lock(&self.in_flight).insert(key.clone()) {
            return None;
        }
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Some(InFlightGuard { owner: self, key })
    }
}

/// 在途标记，drop 时释放
struct InFlightGuard<'a> {
    owner: &'a SingleFlight,
    key: RequestKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(&self.owner.in_flight).remove(&self.key);
        self.owner.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 锁中毒时继续使用内部数据，集合本身不会处于半更新状态
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
