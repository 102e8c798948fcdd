//! The central simulation object: a virtual clock and everything scheduled on it
//!
//! A [`Context`] multiplexes cooperating simulation processes onto one thread.
//! Processes interact with the context in three ways:
//! * Scheduling a plan: a callback to run at a future virtual time.
//! * Queueing a callback: a callback to run now, before any further plan.
//! * Emitting and subscribing to typed events.
//!
//! The context also owns module-specific state in the form of data plugins,
//! so that modules (agents, random number streams, reports) can hang their
//! data off the one object that everything already has access to.

use std::{
    any::{Any, TypeId},
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use log::trace;

use crate::plan::{self, ExecutionPhase, Queue};

/// A unit of module-specific state stored on the [`Context`].
///
/// Define one with [`define_data_plugin!`](crate::define_data_plugin); the
/// container is created lazily on first access.
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a new data plugin type with the given container type and default.
#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default: expr) => {
        struct $plugin {}

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

/// A plan id that can be used to cancel a scheduled plan.
pub type PlanId = plan::Id;

type Callback = dyn FnOnce(&mut Context);
type EventHandler<E> = dyn Fn(&mut Context, E);

pub struct Context {
    plan_queue: Queue<Box<Callback>>,
    callback_queue: VecDeque<Box<Callback>>,
    event_handlers: HashMap<TypeId, Box<dyn Any>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            callback_queue: VecDeque::new(),
            event_handlers: HashMap::new(),
            data_plugins: HashMap::new(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Registers a handler for events of type `E`.
    ///
    /// When an event is emitted, handlers run in subscription order, each
    /// dispatched through the callback queue (so they fire before any
    /// further timed plan).
    pub fn subscribe_to_event<E: Copy + 'static>(
        &mut self,
        handler: impl Fn(&mut Context, E) + 'static,
    ) {
        let handler_vec = self
            .event_handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::<Vec<Rc<EventHandler<E>>>>::default());
        let handler_vec: &mut Vec<Rc<EventHandler<E>>> = handler_vec.downcast_mut().unwrap();
        handler_vec.push(Rc::new(handler));
    }

    /// Emits an event to all currently subscribed handlers.
    pub fn emit_event<E: Copy + 'static>(&mut self, event: E) {
        // Snapshot the handler list so handlers subscribed while dispatching
        // this event do not see it.
        let handlers = self
            .event_handlers
            .get(&TypeId::of::<E>())
            .map(|handlers| {
                handlers
                    .downcast_ref::<Vec<Rc<EventHandler<E>>>>()
                    .unwrap()
                    .clone()
            })
            .unwrap_or_default();
        for handler in handlers {
            self.queue_callback(move |context| handler(context, event));
        }
    }

    /// Schedules a callback to run at the given virtual time, in phase
    /// `Normal`.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time;
    /// the clock never goes backward.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) -> PlanId {
        self.add_plan_with_phase(time, callback, ExecutionPhase::Normal)
    }

    /// Schedules a callback to run at the given virtual time and phase.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan_with_phase(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) -> PlanId {
        assert!(
            !time.is_nan() && !time.is_infinite() && time >= self.current_time,
            "Invalid plan time: {time} (current time {})",
            self.current_time
        );
        self.plan_queue.add_plan(time, Box::new(callback), phase)
    }

    /// Schedules a callback to run at the current time and then again every
    /// `period` units of virtual time, as long as other plans remain.
    ///
    /// The first tick fires at the current time, so observers get a baseline
    /// before anything else happens. The plan stops rescheduling itself once
    /// it is the only plan left, so a drained queue still ends the run.
    ///
    /// # Panics
    ///
    /// Panics if `period` is not positive or is NaN.
    pub fn add_periodic_plan_with_phase(
        &mut self,
        period: f64,
        callback: impl Fn(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) {
        assert!(period > 0.0 && !period.is_nan(), "Invalid period: {period}");
        let callback = Rc::new(callback);
        let current_time = self.current_time;
        self.add_plan_with_phase(
            current_time,
            move |context| run_periodic_plan(context, period, phase, callback),
            phase,
        );
    }

    /// Cancels a plan that has not yet run.
    ///
    /// # Panics
    ///
    /// Panics if the plan was already cancelled or has executed.
    pub fn cancel_plan(&mut self, id: &PlanId) {
        self.plan_queue.cancel_plan(id);
    }

    /// Queues a callback to run at the current virtual time, before any
    /// further timed plan.
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    fn add_plugin<T: DataPlugin>(&mut self) {
        self.data_plugins
            .insert(TypeId::of::<T>(), Box::new(T::create_data_container()));
    }

    /// Returns a mutable reference to a data container, creating it if it
    /// does not exist yet.
    pub fn get_data_container_mut<T: DataPlugin>(&mut self) -> &mut T::DataContainer {
        let type_id = &TypeId::of::<T>();
        if !self.data_plugins.contains_key(type_id) {
            self.add_plugin::<T>();
        }
        self.data_plugins
            .get_mut(type_id)
            .unwrap()
            .downcast_mut::<T::DataContainer>()
            .unwrap()
    }

    /// Returns a reference to a data container if it has been created.
    pub fn get_data_container<T: DataPlugin>(&self) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())?
            .downcast_ref::<T::DataContainer>()
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Requests that the run stop before the next timed plan.
    ///
    /// Queued callbacks at the current time still run; pending plans are
    /// abandoned, not resumed. This is the normal way a run ends at its
    /// horizon.
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at t={}", self.current_time);
        self.shutdown_requested = true;
    }

    /// Executes callbacks and plans in time order until the plan queue is
    /// drained or [`shutdown`](Context::shutdown) is requested.
    pub fn execute(&mut self) {
        trace!("entering event loop");
        loop {
            // Callbacks ("run now") always drain before the next timed plan.
            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }

            if self.shutdown_requested {
                break;
            }

            if let Some(plan) = self.plan_queue.get_next_plan() {
                self.current_time = plan.time;
                (plan.data)(self);
            } else {
                // No plans left; the simulation is over.
                break;
            }
        }
        trace!("event loop finished at t={}", self.current_time);
    }
}

fn run_periodic_plan(
    context: &mut Context,
    period: f64,
    phase: ExecutionPhase,
    callback: Rc<dyn Fn(&mut Context)>,
) {
    callback(context);

    if !context.plan_queue.is_empty() {
        let next_time = context.current_time + period;
        context.add_plan_with_phase(
            next_time,
            move |context| run_periodic_plan(context, period, phase, callback),
            phase,
        );
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    define_data_plugin!(ComponentA, Vec<u32>, vec![]);

    fn add_plan(context: &mut Context, time: f64, value: u32) -> PlanId {
        context.add_plan(time, move |context| {
            context.get_data_container_mut::<ComponentA>().push(value);
        })
    }

    #[test]
    #[should_panic(expected = "Invalid plan time")]
    fn negative_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, -1.0, 0);
    }

    #[test]
    #[should_panic(expected = "Invalid plan time")]
    fn infinite_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, f64::INFINITY, 0);
    }

    #[test]
    #[should_panic(expected = "Invalid plan time")]
    fn nan_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, f64::NAN, 0);
    }

    #[test]
    #[should_panic(expected = "Invalid plan time")]
    fn plan_time_in_the_past() {
        let mut context = Context::new();
        add_plan(&mut context, 2.0, 1);
        context.execute();
        add_plan(&mut context, 1.0, 2);
    }

    #[test]
    fn empty_context() {
        let mut context = Context::new();
        context.execute();
        assert_eq!(context.get_current_time(), 0.0);
    }

    #[test]
    fn timed_plan_advances_clock() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 1);
        context.execute();
        assert_eq!(context.get_current_time(), 1.0);
        assert_eq!(*context.get_data_container_mut::<ComponentA>(), vec![1]);
    }

    #[test]
    fn callback_runs_without_advancing_clock() {
        let mut context = Context::new();
        context.queue_callback(|context| {
            context.get_data_container_mut::<ComponentA>().push(1);
        });
        context.execute();
        assert_eq!(context.get_current_time(), 0.0);
        assert_eq!(*context.get_data_container_mut::<ComponentA>(), vec![1]);
    }

    #[test]
    fn callback_fires_before_timed_plan() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 2);
        context.queue_callback(|context| {
            context.get_data_container_mut::<ComponentA>().push(1);
        });
        context.execute();
        assert_eq!(*context.get_data_container_mut::<ComponentA>(), vec![1, 2]);
    }

    #[test]
    fn plan_adds_callback_and_plan() {
        let mut context = Context::new();
        context.add_plan(1.0, |context| {
            context.get_data_container_mut::<ComponentA>().push(1);
            // The plan is added first but the callback fires first.
            add_plan(context, 2.0, 3);
            context.queue_callback(|context| {
                context.get_data_container_mut::<ComponentA>().push(2);
            });
        });
        context.execute();
        assert_eq!(context.get_current_time(), 2.0);
        assert_eq!(
            *context.get_data_container_mut::<ComponentA>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn plans_at_same_time_fire_in_order() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 1);
        add_plan(&mut context, 1.0, 2);
        context.execute();
        assert_eq!(*context.get_data_container_mut::<ComponentA>(), vec![1, 2]);
    }

    #[test]
    fn last_phase_plan_runs_after_same_time_normal_plans() {
        let mut context = Context::new();
        context.add_plan_with_phase(
            1.0,
            |context| {
                context.get_data_container_mut::<ComponentA>().push(3);
            },
            ExecutionPhase::Last,
        );
        add_plan(&mut context, 1.0, 1);
        add_plan(&mut context, 1.0, 2);
        context.execute();
        assert_eq!(
            *context.get_data_container_mut::<ComponentA>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn cancel_plan() {
        let mut context = Context::new();
        let to_cancel = add_plan(&mut context, 2.0, 1);
        context.add_plan(1.0, move |context| {
            context.cancel_plan(&to_cancel);
        });
        context.execute();
        assert_eq!(context.get_current_time(), 1.0);
        assert!(context
            .get_data_container_mut::<ComponentA>()
            .is_empty());
    }

    #[test]
    fn shutdown_abandons_pending_plans() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 1);
        context.add_plan(2.0, Context::shutdown);
        add_plan(&mut context, 3.0, 3);
        context.execute();
        assert_eq!(context.get_current_time(), 2.0);
        assert_eq!(*context.get_data_container_mut::<ComponentA>(), vec![1]);
    }

    #[test]
    fn periodic_plan_ticks_until_queue_drains() {
        let mut context = Context::new();
        context.add_periodic_plan_with_phase(
            1.0,
            |context| {
                let t = context.get_current_time() as u32;
                context.get_data_container_mut::<ComponentA>().push(t);
            },
            ExecutionPhase::Last,
        );
        add_plan(&mut context, 1.5, 100);
        context.execute();
        // Baseline tick at t=0, ticks at 1.0 and 2.0; nothing left after 2.0.
        assert_eq!(
            *context.get_data_container_mut::<ComponentA>(),
            vec![0, 1, 100, 2]
        );
        assert_eq!(context.get_current_time(), 2.0);
    }

    #[derive(Copy, Clone)]
    struct ValueEvent {
        value: u32,
    }

    #[test]
    fn event_handlers_fire_in_subscription_order() {
        let mut context = Context::new();
        context.subscribe_to_event(|context, event: ValueEvent| {
            context
                .get_data_container_mut::<ComponentA>()
                .push(event.value);
        });
        context.subscribe_to_event(|context, event: ValueEvent| {
            context
                .get_data_container_mut::<ComponentA>()
                .push(event.value + 1);
        });
        context.emit_event(ValueEvent { value: 1 });
        context.execute();
        assert_eq!(*context.get_data_container_mut::<ComponentA>(), vec![1, 2]);
    }

    #[test]
    fn event_without_subscribers_is_dropped() {
        let mut context = Context::new();
        context.emit_event(ValueEvent { value: 1 });
        context.execute();
        assert!(context
            .get_data_container_mut::<ComponentA>()
            .is_empty());
    }

    #[test]
    fn event_handlers_run_before_later_plans() {
        let mut context = Context::new();
        context.subscribe_to_event(|context, event: ValueEvent| {
            context
                .get_data_container_mut::<ComponentA>()
                .push(event.value);
        });
        context.add_plan(1.0, |context| {
            context.emit_event(ValueEvent { value: 1 });
        });
        add_plan(&mut context, 1.0, 2);
        context.execute();
        assert_eq!(*context.get_data_container_mut::<ComponentA>(), vec![1, 2]);
    }
}
