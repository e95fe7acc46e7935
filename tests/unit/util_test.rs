//! Tests for utility functions

use std::any::Any;

use prometheus_priority_limiter::util::exception::panic_message;
use prometheus_priority_limiter::util::thread_name::{
    current_thread_name, sub_pool_thread_name, ThreadNameGuard,
};
use prometheus_priority_limiter::Priority;

#[test]
fn test_priority_ordering() {
    assert!(Priority::High > Priority::Low);
    let mut priorities = vec![Priority::High, Priority::Low, Priority::High];
    priorities.sort();
    assert_eq!(priorities, vec![Priority::Low, Priority::High, Priority::High]);
}

#[test]
fn test_priority_serde_and_display() {
    assert_eq!(serde_json::to_string(&Priority::High).unwrap(), r#""high""#);
    assert_eq!(
        serde_json::from_str::<Priority>(r#""low""#).unwrap(),
        Priority::Low
    );
    assert!(serde_json::from_str::<Priority>(r#""urgent""#).is_err());
    assert_eq!(Priority::Low.to_string(), "low");
}

#[test]
fn test_panic_message_of_common_payloads() {
    let static_str: Box<dyn Any + Send> = Box::new("static");
    let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
    assert_eq!(panic_message(static_str.as_ref()), "static");
    assert_eq!(panic_message(owned.as_ref()), "owned");
}

#[test]
fn test_sub_pool_thread_name_format() {
    assert_eq!(sub_pool_thread_name("gpu", "worker-3"), "gpu[worker-3]");
}

#[test]
fn test_thread_name_guard_on_named_thread() {
    let handle = std::thread::Builder::new()
        .name("blocking-7".into())
        .spawn(|| {
            let during = {
                let _guard = ThreadNameGuard::enter(Some("ocr"));
                current_thread_name()
            };
            (during, current_thread_name())
        })
        .unwrap();

    let (during, after) = handle.join().unwrap();
    assert_eq!(during, "ocr[blocking-7]");
    assert_eq!(after, "blocking-7");
}
