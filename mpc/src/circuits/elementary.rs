use crate::{executor::MpcExecutionContext, join_circuits, MpcDealer, MpcEngine, MpcShare};

/// Multiply two shares using a Beaver triple.
/// Cost: 1 communication round with 2 openings.
pub async fn mul<E: MpcEngine>(ctx: &MpcExecutionContext<E>, x: E::Share, y: E::Share) -> E::Share {
    let (a, b, c) = ctx.with_dealer(|dealer| dealer.next_beaver_triple());
    let (e, d) = join_circuits!(ctx.open_unchecked(x - a), ctx.open_unchecked(y - b));
    c + b.scale(e) + a.scale(d) + ctx.plain(e * d)
}
