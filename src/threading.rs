//! Thread priority and affinity helpers.
//!
//! The MAC worker drives the scheduler on a hard 1 ms cadence and wants a
//! real-time class; the agent loop must stay out of its way and runs at the
//! bottom. All of this degrades to a no-op where the platform or privileges
//! do not allow it.

/// Restrict the whole process to the first `nof_cores` cores (Linux only).
pub fn set_cpu_affinity(nof_cores: usize) {
    #[cfg(target_os = "linux")]
    unsafe {
        use libc::{cpu_set_t, getpid, sched_setaffinity, CPU_SET, CPU_ZERO};

        let mut set: cpu_set_t = std::mem::zeroed();
        CPU_ZERO(&mut set);
        for core in 0..nof_cores.max(1) {
            CPU_SET(core, &mut set);
        }
        let _ = sched_setaffinity(getpid(), std::mem::size_of::<cpu_set_t>(), &set);
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = nof_cores;
    }
}

/// Set the calling thread's scheduling class.
///
/// Levels: 2 and above is real-time FIFO (the TTI driver), 1 is round-robin,
/// 0 is the default class for background work (the agent loop). Real-time
/// classes silently fail without the needed privileges.
pub fn set_thread_priority(priority: i32) {
    #[cfg(target_os = "linux")]
    unsafe {
        use libc::{
            pthread_self, pthread_setschedparam, sched_param, SCHED_FIFO, SCHED_OTHER, SCHED_RR,
        };

        let (policy, sched_priority) = if priority >= 2 {
            (SCHED_FIFO, 70)
        } else if priority == 1 {
            (SCHED_RR, 30)
        } else {
            (SCHED_OTHER, 0)
        };

        let mut param: sched_param = std::mem::zeroed();
        param.sched_priority = sched_priority;
        let _ = pthread_setschedparam(pthread_self(), policy, &param);
    }
    #[cfg(target_os = "macos")]
    {
        // macOS expresses this as QoS classes instead of numeric priorities.
        const QOS_CLASS_USER_INITIATED: u32 = 0x19;
        const QOS_CLASS_BACKGROUND: u32 = 0x09;

        extern "C" {
            fn pthread_set_qos_class_self_np(qos_class: u32, relative_priority: i32) -> i32;
        }

        let qos = if priority >= 1 { QOS_CLASS_USER_INITIATED } else { QOS_CLASS_BACKGROUND };
        unsafe {
            let _ = pthread_set_qos_class_self_np(qos, 0);
        }
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = priority;
    }
}

/// Pin the calling thread to one core (Linux only).
pub fn set_thread_core(core_id: usize) {
    #[cfg(target_os = "linux")]
    unsafe {
        use libc::{cpu_set_t, pthread_self, pthread_setaffinity_np, CPU_SET, CPU_ZERO};

        let mut set: cpu_set_t = std::mem::zeroed();
        CPU_ZERO(&mut set);
        CPU_SET(core_id, &mut set);
        let _ = pthread_setaffinity_np(pthread_self(), std::mem::size_of::<cpu_set_t>(), &set);
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = core_id;
    }
}
