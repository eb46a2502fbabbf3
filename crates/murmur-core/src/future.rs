use std::future::Future;
use std::pin::Pin;

/// `BoxFuture` 是 murmur 对象安全扩展点使用的通用 Future 包装。
///
/// # 设计背景（Why）
/// - 门面返回的请求句柄需要以统一形态进入 `await` 语法，而不向调用方暴露
///   内部组合子的具体类型；
/// - 约束 `Send + 'a`，保证句柄可以跨线程调度。
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
