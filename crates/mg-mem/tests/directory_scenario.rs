//! Drives the directory through the kernel via its two port processes,
//! reproducing the token-flow acceptance scenario: tokens accumulate as
//! they arrive from the top ring, then drain back to zero as both caches
//! in the group evict, invalidating the line.

use std::cell::RefCell;
use std::rc::Rc;

use mg_core::{Inspect, Kernel, Process, Value};
use mg_mem::{DirectBankSelector, Directory, Message, MessageKind};

fn inspect(dir: &Rc<RefCell<Directory>>, path: &str) -> Option<Value> {
    dir.borrow().query(path)
}

#[test]
fn acquire_then_evict_both_caches_invalidates_the_line() {
    let dir = Rc::new(RefCell::new(Directory::new(
        "dir0",
        4,
        1,
        64,
        Box::new(DirectBankSelector),
        0,
        2,
        4,
    )));

    let mut kernel = Kernel::new();
    let bottom_id = kernel.register_process("directory.bottom");
    let top_id = kernel.register_process("directory.top");

    let mut bottom = mg_mem::BottomPort(Rc::clone(&dir), Vec::new());
    let mut top = mg_mem::TopPort(Rc::clone(&dir), Vec::new());

    dir.borrow_mut()
        .top_incoming
        .push(Message::new(MessageKind::AcquireTokens, 0x1000, 2, false, 0), &mut Vec::new());

    {
        let mut procs: Vec<&mut dyn Process> = vec![&mut bottom, &mut top];
        kernel.run_cycle(&mut procs).unwrap();
    }
    assert_eq!(inspect(&dir, "lines.0.0.tokens"), Some(Value::U32(2)));

    dir.borrow_mut()
        .bottom_incoming
        .push(Message::new(MessageKind::Eviction, 0x1000, 1, false, 0), &mut Vec::new());
    kernel.wake([bottom_id]);
    {
        let mut procs: Vec<&mut dyn Process> = vec![&mut bottom, &mut top];
        kernel.run_cycle(&mut procs).unwrap();
    }
    assert_eq!(inspect(&dir, "lines.0.0.tokens"), Some(Value::U32(1)));

    dir.borrow_mut()
        .bottom_incoming
        .push(Message::new(MessageKind::Eviction, 0x1000, 1, false, 1), &mut Vec::new());
    kernel.wake([bottom_id, top_id]);
    {
        let mut procs: Vec<&mut dyn Process> = vec![&mut bottom, &mut top];
        kernel.run_cycle(&mut procs).unwrap();
    }
    assert_eq!(inspect(&dir, "lines.0.0.tokens"), None, "line invalidated once the group holds zero tokens");
}
