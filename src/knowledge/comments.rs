use std::collections::{HashMap, HashSet};

use super::KnowledgeError;
use crate::storage::Message;

/// A comment with its nested replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentThread {
    pub message: Message,
    pub replies: Vec<CommentThread>,
}

/// Nest chronological messages under their parents.
///
/// Replies keep chronological order under each parent. A reply whose parent
/// is not in `messages` is promoted to the top level.
pub fn thread(messages: Vec<Message>) -> Vec<CommentThread> {
    let ids: HashSet<i64> = messages.iter().map(|m| m.id).collect();
    let mut top = Vec::new();
    let mut replies: HashMap<i64, Vec<Message>> = HashMap::new();
    for message in messages {
        match message.parent_id.filter(|p| ids.contains(p) && *p != message.id) {
            Some(parent) => replies.entry(parent).or_default().push(message),
            None => top.push(message),
        }
    }
    let mut threads: Vec<CommentThread> = top
        .into_iter()
        .map(|m| attach(m, &mut replies))
        .collect();

    // Members of a reply cycle never reach the top level; surface them there
    let mut leftover: Vec<Message> = replies.into_values().flatten().collect();
    leftover.sort_by_key(|m| (m.date, m.id));
    threads.extend(leftover.into_iter().map(|message| CommentThread {
        message,
        replies: Vec::new(),
    }));
    threads
}

fn attach(message: Message, replies: &mut HashMap<i64, Vec<Message>>) -> CommentThread {
    // Removing as we go means a parent cycle cannot recurse forever
    let children = replies.remove(&message.id).unwrap_or_default();
    CommentThread {
        replies: children.into_iter().map(|c| attach(c, replies)).collect(),
        message,
    }
}

/// Depth-first `(depth, message)` pairs for line rendering.
pub fn flatten(threads: &[CommentThread]) -> Vec<(usize, &Message)> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, &CommentThread)> = threads.iter().rev().map(|t| (0, t)).collect();
    while let Some((depth, t)) = stack.pop() {
        out.push((depth, &t.message));
        stack.extend(t.replies.iter().rev().map(|r| (depth + 1, r)));
    }
    out
}

/// Trimmed comment body, rejecting blank input before any write.
pub fn validate_body(raw: &str) -> Result<String, KnowledgeError> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(KnowledgeError::EmptyComment);
    }
    Ok(body.to_string())
}
