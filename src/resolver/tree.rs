use crate::errors::ResolveError;
use crate::models::{Conversation, MessageNode, Transcript};

/// Resolve a conversation's active branch into an ordered transcript.
///
/// Pure function of `node_map` and `current_node_id`: walks parent links from
/// the tip back to the root, reverses to root-first order, and drops hidden
/// nodes while preserving the relative order of the visible ones. Calling it
/// twice on the same input yields the same output.
///
/// Tree order is authoritative; timestamps are never consulted, because
/// history edits create branches out of chronological order.
///
/// # Errors
///
/// - [`ResolveError::DanglingPointer`] when `current_node_id` or an ancestor
///   reference is missing from the map
/// - [`ResolveError::CyclicTree`] when the walk takes more steps than there
///   are nodes (a parent cycle; never loops, never truncates silently)
/// - [`ResolveError::MalformedTree`] when the map's root invariant is broken
pub fn resolve(conversation: &Conversation) -> Result<Transcript, ResolveError> {
    let node_count = conversation.len();
    let mut branch: Vec<&MessageNode> = Vec::new();
    let mut cursor: &str = &conversation.current_node_id;
    let mut steps = 0usize;

    loop {
        let node = conversation.node(cursor).ok_or_else(|| {
            ResolveError::DanglingPointer {
                conversation_id: conversation.id.clone(),
                node_id: cursor.to_string(),
            }
        })?;

        steps += 1;
        if steps > node_count {
            return Err(ResolveError::CyclicTree {
                conversation_id: conversation.id.clone(),
                steps,
            });
        }

        branch.push(node);
        match &node.parent_id {
            Some(parent) => cursor = parent,
            None => break,
        }
    }

    // The walk terminated on a parentless node; it must be the map's unique
    // root, otherwise the payload stitched together disjoint trees.
    let roots = conversation
        .node_map
        .values()
        .filter(|n| n.parent_id.is_none())
        .count();
    if roots != 1 {
        return Err(ResolveError::MalformedTree {
            conversation_id: conversation.id.clone(),
            reason: format!("expected exactly one root node, found {}", roots),
        });
    }

    let messages = branch
        .into_iter()
        .rev()
        .filter(|node| !node.is_hidden())
        .cloned()
        .collect();

    Ok(Transcript::new(messages))
}
