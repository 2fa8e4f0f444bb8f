use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use color_eyre::eyre;
use futures_util::FutureExt;

/// Turns a panic inside an engine call into an ordinary error for that call.
pub(crate) async fn contain<T, Fut>(call: Fut) -> color_eyre::Result<T>
where
	Fut: Future<Output = color_eyre::Result<T>>,
{
	match AssertUnwindSafe(call).catch_unwind().await {
		Ok(result) => result,
		Err(panic) => Err(eyre::eyre!("Engine call panicked: {}", panic_message(panic.as_ref()))),
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(message) = panic.downcast_ref::<&str>() {
		message
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message
	} else {
		"non-string panic payload"
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn panic_becomes_an_error() {
		let result: color_eyre::Result<u32> = contain(async { panic!("engine blew up") }).await;
		let err = result.expect_err("panic should surface as an error");

		assert!(err.to_string().contains("engine blew up"));
	}

	#[tokio::test]
	async fn results_pass_through() {
		assert_eq!(contain(async { Ok(7_u32) }).await.expect("call failed"), 7);
		assert!(contain::<u32, _>(async { Err(eyre::eyre!("refused")) }).await.is_err());
	}
}
