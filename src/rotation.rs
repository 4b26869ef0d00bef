/*
 *  rotation.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Card rotation: a timer driven state machine plus the task that runs it
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use log::{debug, error, info};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::cards::Card;

/// Floor applied to every card's requested duration
pub const MIN_DURATION: Duration = Duration::from_millis(4000);
pub const TRANSITION_DURATION: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Showing(usize),
    Transitioning { from: usize, to: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationEvent {
    TransitionStarted { from: usize },
    Advanced { to: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Advance,
    Transition,
}

/// The single pending timer. `owner` is the index that armed it.
#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    handle: u64,
    kind: TimerKind,
    owner: usize,
    deadline: Instant,
}

pub fn effective_duration(card: &Card) -> Duration {
    card.duration.max(MIN_DURATION)
}

/// Cycles through cards: `Showing(i)` for the card's effective duration,
/// `Transitioning` for a fixed 400ms, then `Showing(i + 1 mod n)`.
///
/// At most one timer is pending at any time and it is always cancelled
/// before the index or the card list change.
#[derive(Debug)]
pub struct RotationScheduler {
    cards: Vec<Card>,
    index: usize,
    transitioning: bool,
    running: bool,
    timer: Option<PendingTimer>,
    next_handle: u64,
}

impl Default for RotationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationScheduler {
    pub fn new() -> Self {
        Self {
            cards: vec![Card::placeholder()],
            index: 0,
            transitioning: false,
            running: false,
            timer: None,
            next_handle: 1,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(t) = self.timer.take() {
            debug!("rotation timer #{} ({:?}) cancelled", t.handle, t.kind);
        }
    }

    fn arm(&mut self, kind: TimerKind, deadline: Instant) {
        // one pending timer, never two
        self.cancel_timer();
        let handle = self.next_handle;
        self.next_handle += 1;
        self.timer = Some(PendingTimer { handle, kind, owner: self.index, deadline });
    }

    /// Replace the list wholesale; the index goes back to 0 and timing
    /// restarts from the first card. An empty list shows the placeholder,
    /// which never advances.
    pub fn set_cards(&mut self, cards: Vec<Card>, now: Instant) {
        self.cancel_timer();
        self.index = 0;
        self.transitioning = false;
        self.running = true;

        if cards.is_empty() {
            info!("no cards to rotate, showing placeholder");
            self.cards = vec![Card::placeholder()];
            return;
        }

        info!("rotation list replaced ({} cards)", cards.len());
        self.cards = cards;
        let first = effective_duration(&self.cards[0]);
        self.arm(TimerKind::Advance, now + first);
    }

    /// Fire the pending timer if it is due. Call repeatedly until `None`
    /// to catch up after a late wake-up.
    pub fn poll(&mut self, now: Instant) -> Option<RotationEvent> {
        let timer = self.timer.filter(|t| t.deadline <= now)?;
        self.timer = None;

        if timer.owner != self.index {
            debug!("stale rotation timer #{} dropped", timer.handle);
            return None;
        }

        match timer.kind {
            TimerKind::Advance => {
                self.transitioning = true;
                self.arm(TimerKind::Transition, timer.deadline + TRANSITION_DURATION);
                Some(RotationEvent::TransitionStarted { from: self.index })
            }
            TimerKind::Transition => {
                self.index = (self.index + 1) % self.cards.len();
                self.transitioning = false;
                let shown = effective_duration(&self.cards[self.index]);
                self.arm(TimerKind::Advance, timer.deadline + shown);
                debug!("rotation advanced to {} ({})", self.index, self.cards[self.index].id);
                Some(RotationEvent::Advanced { to: self.index })
            }
        }
    }

    /// Stop rotating: the timer goes first, then the state.
    pub fn teardown(&mut self) {
        self.cancel_timer();
        self.running = false;
        self.transitioning = false;
        self.index = 0;
    }

    pub fn phase(&self) -> Phase {
        if !self.running {
            Phase::Idle
        } else if self.transitioning {
            Phase::Transitioning { from: self.index, to: (self.index + 1) % self.cards.len() }
        } else {
            Phase::Showing(self.index)
        }
    }

    pub fn active_card(&self) -> &Card {
        &self.cards[self.index]
    }

    pub fn active_index(&self) -> usize {
        self.index
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn is_placeholder(&self) -> bool {
        self.cards.len() == 1 && self.cards[0].is_placeholder()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.map(|t| t.deadline)
    }

    pub fn pending_timers(&self) -> usize {
        usize::from(self.timer.is_some())
    }
}

/// What the display should show right now
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveView {
    pub card: Card,
    pub index: usize,
    pub total: usize,
    pub transitioning: bool,
}

impl ActiveView {
    fn of(s: &RotationScheduler) -> Self {
        Self {
            card: s.active_card().clone(),
            index: s.active_index(),
            total: s.len(),
            transitioning: s.is_transitioning(),
        }
    }
}

/// Running rotation task
pub struct RotationHandle {
    view_rx: watch::Receiver<ActiveView>,
    stop_sender: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RotationHandle {
    pub fn subscribe(&self) -> watch::Receiver<ActiveView> {
        self.view_rx.clone()
    }

    pub fn current(&self) -> ActiveView {
        self.view_rx.borrow().clone()
    }

    pub async fn stop(&mut self) {
        if let Some(sender) = self.stop_sender.take() {
            if let Err(e) = sender.send(()).await {
                error!("Failed to send stop signal to rotation task: {}", e);
            }
        }
        if let Some(task) = self.task.take() {
            task.await.unwrap_or_else(|e| error!("Rotation task failed to join: {}", e));
        }
        info!("Rotation stopped.");
    }
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        if let Some(sender) = self.stop_sender.take() {
            if let Err(e) = sender.try_send(()) {
                error!("Failed to send stop signal to rotation task on drop: {}", e);
            }
        }
    }
}

/// Drive a scheduler from a card list channel; every state change is
/// published on the returned handle.
pub fn spawn_rotation(mut cards_rx: watch::Receiver<Vec<Card>>) -> RotationHandle {
    let mut scheduler = RotationScheduler::new();
    scheduler.set_cards(cards_rx.borrow_and_update().clone(), Instant::now());

    let (view_tx, view_rx) = watch::channel(ActiveView::of(&scheduler));
    let (stop_tx, mut stop_rx) = mpsc::channel(1);

    let task = tokio::spawn(async move {
        let mut cards_open = true;
        loop {
            let deadline = scheduler.next_deadline();
            tokio::select! {
                _ = stop_rx.recv() => {
                    scheduler.teardown();
                    info!("Rotation task received stop signal. Exiting.");
                    break;
                }
                changed = cards_rx.changed(), if cards_open => {
                    match changed {
                        Ok(()) => {
                            let cards = cards_rx.borrow_and_update().clone();
                            scheduler.set_cards(cards, Instant::now());
                        }
                        Err(_) => {
                            debug!("card source closed, rotating the last list");
                            cards_open = false;
                            continue;
                        }
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let now = Instant::now();
                    while scheduler.poll(now).is_some() {}
                }
            }
            view_tx.send_replace(ActiveView::of(&scheduler));
        }
    });

    RotationHandle { view_rx, stop_sender: Some(stop_tx), task: Some(task) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardBody;

    fn card(id: &str, ms: u64) -> Card {
        Card::new(id, ms, CardBody::Saints(vec![id.to_string()]))
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_new_is_idle_on_placeholder() {
        let s = RotationScheduler::new();
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.active_card().is_placeholder());
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn test_exact_timing_two_cards() {
        let t0 = Instant::now();
        let mut s = RotationScheduler::new();
        s.set_cards(vec![card("a", 8000), card("b", 10000)], t0);
        assert_eq!(s.phase(), Phase::Showing(0));

        assert_eq!(s.poll(t0 + ms(7999)), None);
        assert_eq!(s.poll(t0 + ms(8000)), Some(RotationEvent::TransitionStarted { from: 0 }));
        assert_eq!(s.phase(), Phase::Transitioning { from: 0, to: 1 });

        assert_eq!(s.poll(t0 + ms(8399)), None);
        assert_eq!(s.poll(t0 + ms(8400)), Some(RotationEvent::Advanced { to: 1 }));
        assert_eq!(s.phase(), Phase::Showing(1));
        assert_eq!(s.next_deadline(), Some(t0 + ms(18400)));
    }

    #[test]
    fn test_floor_applies() {
        let t0 = Instant::now();
        let mut s = RotationScheduler::new();
        s.set_cards(vec![card("short", 500), card("b", 8000)], t0);
        assert_eq!(s.next_deadline(), Some(t0 + MIN_DURATION));
    }

    #[test]
    fn test_wraps_around() {
        let t0 = Instant::now();
        let mut s = RotationScheduler::new();
        s.set_cards(vec![card("a", 4000), card("b", 4000)], t0);
        let late = t0 + ms(20_000);
        let mut events = 0;
        while s.poll(late).is_some() {
            events += 1;
            assert_eq!(s.pending_timers(), 1);
        }
        // 4400ms per full step: 4 steps fit in 20s, landing back on card 0
        assert_eq!(events, 8);
        assert_eq!(s.active_index(), 0);
    }

    #[test]
    fn test_empty_list_never_advances() {
        let t0 = Instant::now();
        let mut s = RotationScheduler::new();
        s.set_cards(vec![], t0);
        assert!(s.is_placeholder());
        assert_eq!(s.phase(), Phase::Showing(0));
        assert_eq!(s.next_deadline(), None);
        assert_eq!(s.poll(t0 + Duration::from_secs(3600)), None);
        assert_eq!(s.active_card().id, "placeholder");
    }

    #[test]
    fn test_set_cards_cancels_pending_and_resets() {
        let t0 = Instant::now();
        let mut s = RotationScheduler::new();
        s.set_cards(vec![card("a", 4000), card("b", 4000), card("c", 4000)], t0);
        s.poll(t0 + ms(4000));
        s.poll(t0 + ms(4400));
        assert_eq!(s.active_index(), 1);

        let t1 = t0 + ms(5000);
        s.set_cards(vec![card("x", 9000), card("y", 4000)], t1);
        assert_eq!(s.active_index(), 0);
        assert_eq!(s.pending_timers(), 1);
        // the old card b deadline (8400) must not fire
        assert_eq!(s.poll(t0 + ms(8400)), None);
        assert_eq!(s.next_deadline(), Some(t1 + ms(9000)));
    }

    #[test]
    fn test_replace_during_transition() {
        let t0 = Instant::now();
        let mut s = RotationScheduler::new();
        s.set_cards(vec![card("a", 4000), card("b", 4000)], t0);
        s.poll(t0 + ms(4000));
        assert!(s.is_transitioning());

        s.set_cards(vec![card("c", 5000), card("d", 5000)], t0 + ms(4100));
        assert!(!s.is_transitioning());
        assert_eq!(s.poll(t0 + ms(4400)), None);
        assert_eq!(s.active_index(), 0);
    }

    #[test]
    fn test_teardown_cancels() {
        let t0 = Instant::now();
        let mut s = RotationScheduler::new();
        s.set_cards(vec![card("a", 4000), card("b", 4000)], t0);
        s.teardown();
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.poll(t0 + ms(60_000)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_follows_channel() {
        let (tx, rx) = watch::channel(vec![card("a", 8000), card("b", 10000)]);
        let mut handle = spawn_rotation(rx);
        let mut views = handle.subscribe();
        assert_eq!(handle.current().card.id, "a");

        views.changed().await.unwrap();
        assert!(views.borrow_and_update().transitioning);
        views.changed().await.unwrap();
        let v = views.borrow_and_update().clone();
        assert_eq!((v.card.id.as_str(), v.index, v.transitioning), ("b", 1, false));

        tx.send(vec![]).unwrap();
        views.changed().await.unwrap();
        assert!(views.borrow_and_update().card.is_placeholder());

        handle.stop().await;
    }
}
