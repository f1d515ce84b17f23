//! 运动控制器
//!
//! 把"按住了哪些方向键 + 倒车开关 + 显式运动意图"归约为唯一一条
//! "此刻小车应该做什么"的指令；保活每个周期读取它并重发。

use crate::channel::CommandChannel;
use parking_lot::Mutex;
use rover_protocol::{Command, Direction, Motion, clamp_speed};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// 由按键状态推导当前指令
///
/// 优先级（必须严格保持）：
/// 1. 前后同时按下：倒车开关打开时为 `Backward`，否则 `Forward`
/// 2. 仅前 → `Forward`
/// 3. 仅后 → `Backward`
/// 4. 左 → `Left`
/// 5. 右 → `Right`
/// 6. 否则 `Stop`
///
/// ```
/// use rover_driver::derive_command;
/// use rover_protocol::{Command, Direction};
/// use std::collections::BTreeSet;
///
/// let pressed = BTreeSet::from([Direction::Forward, Direction::Backward]);
/// assert_eq!(derive_command(&pressed, false), Command::Forward);
/// assert_eq!(derive_command(&pressed, true), Command::Backward);
/// ```
pub fn derive_command(pressed: &BTreeSet<Direction>, reversed: bool) -> Command {
    let forward = pressed.contains(&Direction::Forward);
    let backward = pressed.contains(&Direction::Backward);

    if forward && backward {
        if reversed { Command::Backward } else { Command::Forward }
    } else if forward {
        Command::Forward
    } else if backward {
        Command::Backward
    } else if pressed.contains(&Direction::Left) {
        Command::Left
    } else if pressed.contains(&Direction::Right) {
        Command::Right
    } else {
        Command::Stop
    }
}

/// 运动状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionState {
    /// 当前按住的方向
    pub pressed: BTreeSet<Direction>,
    /// 倒车开关
    pub reversed: bool,
    /// 当前速度（0-100）
    pub speed: u8,
    /// 最近一次显式运动意图（`move_to`），没有按键时生效
    pub intent: Motion,
}

impl MotionState {
    fn new(speed: u8) -> Self {
        Self {
            pressed: BTreeSet::new(),
            reversed: false,
            speed: clamp_speed(speed as i64),
            intent: Motion::Stop,
        }
    }

    /// 此刻应发送的运动指令
    pub fn current_command(&self) -> Command {
        if self.pressed.is_empty() {
            self.intent.command()
        } else {
            derive_command(&self.pressed, self.reversed)
        }
    }
}

/// `set_speed` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedUpdate {
    /// 钳制后的速度
    pub speed: u8,
    /// 存储的速度是否真的发生了变化（用于日志和配置持久化）
    pub changed: bool,
    /// `SetSpeed` 指令是否成功入队
    pub enqueued: bool,
}

/// 运动控制器
///
/// 任意线程可调用；内部状态由 `parking_lot::Mutex` 保护，指令入队是非阻塞的。
#[derive(Debug)]
pub struct MotionController {
    state: Mutex<MotionState>,
    channel: Arc<CommandChannel>,
}

impl MotionController {
    pub fn new(channel: Arc<CommandChannel>, initial_speed: u8) -> Self {
        Self {
            state: Mutex::new(MotionState::new(initial_speed)),
            channel,
        }
    }

    /// 按下方向键，返回该键此前是否未按下
    ///
    /// 按键接管控制：之前的显式运动意图被重置为停车。
    pub fn press(&self, direction: Direction) -> bool {
        let mut state = self.state.lock();
        state.intent = Motion::Stop;
        let inserted = state.pressed.insert(direction);
        if inserted {
            debug!("Pressed {:?} -> {}", direction, state.current_command());
        }
        inserted
    }

    /// 松开方向键，返回该键此前是否按下
    pub fn release(&self, direction: Direction) -> bool {
        let mut state = self.state.lock();
        let removed = state.pressed.remove(&direction);
        if removed {
            debug!("Released {:?} -> {}", direction, state.current_command());
        }
        removed
    }

    /// 松开全部方向键
    pub fn release_all(&self) {
        self.state.lock().pressed.clear();
    }

    pub fn set_reversed(&self, reversed: bool) {
        self.state.lock().reversed = reversed;
    }

    /// 切换倒车开关，返回新值
    pub fn toggle_reversed(&self) -> bool {
        let mut state = self.state.lock();
        state.reversed = !state.reversed;
        info!("Reverse mode {}", if state.reversed { "on" } else { "off" });
        state.reversed
    }

    pub fn is_reversed(&self) -> bool {
        self.state.lock().reversed
    }

    /// 显式运动：记录意图并立即入队一条指令（不等下一个保活周期）
    ///
    /// 返回指令是否成功入队。
    pub fn move_to(&self, motion: impl Into<Motion>) -> bool {
        let motion = motion.into();
        let mut state = self.state.lock();
        state.intent = motion;
        debug!("Move {}", motion);
        self.channel.enqueue(motion.command())
    }

    /// 设置速度
    ///
    /// 值被钳制到 `[0, 100]`。无论值是否变化都会入队一条 `SetSpeed`，
    /// `changed` 只反映存储值是否变化。
    pub fn set_speed(&self, value: i64) -> SpeedUpdate {
        let speed = clamp_speed(value);
        let mut state = self.state.lock();
        self.apply_speed(&mut state, speed)
    }

    /// 在持锁状态下写入速度并入队，保证存储值与入队顺序一致
    fn apply_speed(&self, state: &mut MotionState, speed: u8) -> SpeedUpdate {
        let changed = state.speed != speed;
        state.speed = speed;
        if changed {
            info!("Speed set to {}", speed);
        }
        let enqueued = self.channel.enqueue(Command::SetSpeed(speed));
        SpeedUpdate {
            speed,
            changed,
            enqueued,
        }
    }

    /// 在当前速度基础上调整（方向键 ±5）
    pub fn adjust_speed(&self, delta: i64) -> SpeedUpdate {
        let mut state = self.state.lock();
        let speed = clamp_speed((state.speed as i64).saturating_add(delta));
        self.apply_speed(&mut state, speed)
    }

    pub fn speed(&self) -> u8 {
        self.state.lock().speed
    }

    /// 此刻应发送的运动指令
    pub fn current_command(&self) -> Command {
        self.state.lock().current_command()
    }

    /// 重新入队当前运动指令（保活每个周期调用）
    ///
    /// 推导与入队在同一把锁内完成：与 `move_to` / `stop` 不会交错，
    /// 停车之后不会再补发停车前的方向。
    pub fn resend_current(&self) -> (Command, bool) {
        let state = self.state.lock();
        let cmd = state.current_command();
        (cmd, self.channel.enqueue(cmd))
    }

    /// 紧急停车：松开全部按键，意图置为停车并立即入队 `Stop`
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        state.pressed.clear();
        state.intent = Motion::Stop;
        info!("Emergency stop");
        self.channel.enqueue(Command::Stop)
    }

    /// 状态快照
    pub fn snapshot(&self) -> MotionState {
        self.state.lock().clone()
    }

    pub fn channel(&self) -> &Arc<CommandChannel> {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::LinkMetrics;
    use proptest::prelude::*;

    fn controller(capacity: usize) -> MotionController {
        let channel = Arc::new(CommandChannel::new(capacity, Arc::new(LinkMetrics::new())));
        MotionController::new(channel, 15)
    }

    fn drain(controller: &MotionController) -> Vec<Command> {
        std::iter::from_fn(|| controller.channel().try_dequeue()).collect()
    }

    #[test]
    fn test_derive_single_directions() {
        let set = |dirs: &[Direction]| dirs.iter().copied().collect::<BTreeSet<_>>();
        assert_eq!(derive_command(&set(&[]), false), Command::Stop);
        assert_eq!(derive_command(&set(&[Direction::Forward]), true), Command::Forward);
        assert_eq!(derive_command(&set(&[Direction::Backward]), false), Command::Backward);
        assert_eq!(derive_command(&set(&[Direction::Left]), false), Command::Left);
        assert_eq!(derive_command(&set(&[Direction::Right]), false), Command::Right);
        // 左右同时按下：左优先
        assert_eq!(
            derive_command(&set(&[Direction::Left, Direction::Right]), false),
            Command::Left
        );
        // 前进优先于转向
        assert_eq!(
            derive_command(&set(&[Direction::Forward, Direction::Left]), false),
            Command::Forward
        );
    }

    proptest! {
        /// 前后同时按下时，结果只取决于倒车开关（与左右键无关）
        #[test]
        fn prop_forward_backward_pair_resolved_by_reversed(
            reversed in any::<bool>(),
            left in any::<bool>(),
            right in any::<bool>(),
        ) {
            let mut pressed = BTreeSet::from([Direction::Forward, Direction::Backward]);
            if left { pressed.insert(Direction::Left); }
            if right { pressed.insert(Direction::Right); }

            let expected = if reversed { Command::Backward } else { Command::Forward };
            prop_assert_eq!(derive_command(&pressed, reversed), expected);
        }

        /// 推导结果总是运动指令，且只在没有任何按键时为 Stop
        #[test]
        fn prop_derivation_is_total(mask in 0u8..16, reversed in any::<bool>()) {
            let pressed: BTreeSet<_> = Direction::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, d)| *d)
                .collect();
            let cmd = derive_command(&pressed, reversed);
            prop_assert!(cmd.is_motion());
            prop_assert_eq!(cmd == Command::Stop, pressed.is_empty());
        }
    }

    #[test]
    fn test_press_release_drive_current_command() {
        let c = controller(10);
        assert_eq!(c.current_command(), Command::Stop);

        assert!(c.press(Direction::Forward));
        assert!(!c.press(Direction::Forward));
        assert_eq!(c.current_command(), Command::Forward);

        c.press(Direction::Backward);
        assert_eq!(c.current_command(), Command::Forward);
        assert!(c.toggle_reversed());
        assert_eq!(c.current_command(), Command::Backward);

        c.release(Direction::Forward);
        c.release(Direction::Backward);
        assert_eq!(c.current_command(), Command::Stop);
        // 按键本身不入队，由保活发送
        assert!(drain(&c).is_empty());
    }

    #[test]
    fn test_move_to_enqueues_and_sets_intent() {
        let c = controller(10);
        assert!(c.move_to(Direction::Right));
        assert_eq!(c.current_command(), Command::Right);
        assert!(c.move_to(Motion::Stop));
        assert_eq!(drain(&c), vec![Command::Right, Command::Stop]);
        assert_eq!(c.current_command(), Command::Stop);
    }

    #[test]
    fn test_press_overrides_and_resets_intent() {
        let c = controller(10);
        c.move_to(Motion::Left);
        c.press(Direction::Forward);
        assert_eq!(c.current_command(), Command::Forward);
        c.release(Direction::Forward);
        assert_eq!(c.current_command(), Command::Stop);
    }

    #[test]
    fn test_set_speed_clamps() {
        let c = controller(10);
        assert_eq!(c.set_speed(-5).speed, 0);
        assert_eq!(c.set_speed(150).speed, 100);
        assert_eq!(drain(&c), vec![Command::SetSpeed(0), Command::SetSpeed(100)]);
    }

    #[test]
    fn test_set_speed_resends_identical_value() {
        let c = controller(10);
        let first = c.set_speed(60);
        let second = c.set_speed(60);
        let third = c.set_speed(60);

        assert!(first.changed);
        assert!(!second.changed);
        assert!(!third.changed);
        assert!(first.enqueued && second.enqueued && third.enqueued);
        assert_eq!(drain(&c), vec![Command::SetSpeed(60); 3]);
        assert_eq!(c.speed(), 60);
    }

    #[test]
    fn test_set_speed_reports_full_queue() {
        let c = controller(1);
        assert!(c.set_speed(20).enqueued);
        let update = c.set_speed(30);
        assert!(!update.enqueued);
        // 存储值依然更新
        assert_eq!(c.speed(), 30);
    }

    #[test]
    fn test_adjust_speed_saturates() {
        let c = controller(10);
        assert_eq!(c.adjust_speed(5).speed, 20);
        assert_eq!(c.adjust_speed(-5).speed, 15);
        assert_eq!(c.adjust_speed(-100).speed, 0);
        assert_eq!(c.adjust_speed(i64::MAX).speed, 100);
    }

    #[test]
    fn test_adjust_speed_concurrent_presses_are_not_lost() {
        let c = Arc::new(MotionController::new(
            Arc::new(CommandChannel::new(1024, Arc::new(LinkMetrics::new()))),
            0,
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = c.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        c.adjust_speed(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.speed(), 20);
        // 入队顺序与存储值一致：最后一条就是最终速度
        assert_eq!(drain(&c).last(), Some(&Command::SetSpeed(20)));
    }

    #[test]
    fn test_stop_clears_keys_and_intent() {
        let c = controller(10);
        c.move_to(Direction::Right);
        c.press(Direction::Forward);
        assert!(c.stop());
        assert_eq!(c.current_command(), Command::Stop);
        assert!(c.snapshot().pressed.is_empty());

        assert_eq!(c.resend_current(), (Command::Stop, true));
        assert_eq!(drain(&c), vec![Command::Right, Command::Stop, Command::Stop]);
    }

    #[test]
    fn test_snapshot() {
        let c = controller(10);
        c.press(Direction::Left);
        c.set_reversed(true);
        let snap = c.snapshot();
        assert_eq!(snap.pressed, BTreeSet::from([Direction::Left]));
        assert!(snap.reversed);
        assert_eq!(snap.speed, 15);
        assert_eq!(snap.current_command(), Command::Left);
        c.release_all();
        assert_eq!(c.current_command(), Command::Stop);
    }
}
