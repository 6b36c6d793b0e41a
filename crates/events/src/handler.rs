/// Execute an aggregate command deterministically (no IO, no async).
///
/// The canonical event-sourced lifecycle in one step:
///
/// 1. **Decide**: calls `aggregate.handle(command)` to get events (pure).
/// 2. **Evolve**: applies each event to the aggregate via `apply`.
///
/// This mutates the aggregate in place and is what tests and inline flows
/// use when they do not need persistence or publication; the full pipeline
/// (optimistic concurrency, store, bus) lives in the command dispatcher.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: shopforge_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
