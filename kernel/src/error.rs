//! The kernel's closed error taxonomy.
//!
//! [`ErrorCode`] is the master, `#[repr(i8)]` taxonomy named in SPEC_FULL §6;
//! every fallible kernel call instead returns one of the narrower,
//! call-specific enums defined below via [`define_suberror!`], each a strict
//! subset of [`ErrorCode`] convertible into it with `From`. This mirrors the
//! reference crate's `error::define_suberror!` pattern: callers that want to
//! match precisely on what a given call can return may do so, while code
//! that just wants to log or propagate a uniform code can convert once.
use core::fmt;

/// The full, stable set of error codes this kernel can report. Numeric
/// values are part of the external contract (SPEC_FULL §6) and must not be
/// renumbered.
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Timeout = 1,
    BadId = 2,
    ObjDeleted = 3,
    ObjNotFound = 4,
    NoTcb = 5,
    NoStk = 6,
    TinyStk = 7,
    BadPriority = 8,
    Active = 9,
    NotActive = 10,
    Suspended = 11,
    NotSuspended = 12,
    RegNum = 13,
    NoSem = 14,
    SemFull = 15,
    NoQcb = 16,
    NoMgb = 17,
    QFull = 18,
    NoMsg = 19,
    NoEvs = 20,
    NoTimers = 21,
    BadTmid = 22,
    IllTicks = 23,
    BadParam = 24,
    NoScb = 25,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Define a call-specific error enum that narrows [`ErrorCode`].
///
/// ```ignore
/// define_suberror! {
///     pub enum CreateTaskError {
///         NoTcb,
///         TinyStk,
///         NoStk,
///         BadPriority,
///         BadParam,
///     }
/// }
/// ```
macro_rules! define_suberror {
    ($(#[$meta:meta])* $vis:vis enum $Name:ident { $($Variant:ident,)* }) => {
        $(#[$meta])*
        #[repr(i8)]
        #[derive(Clone, Copy, PartialEq, Eq)]
        $vis enum $Name {
            $( $Variant = $crate::error::ErrorCode::$Variant as i8, )*
        }

        impl core::fmt::Debug for $Name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                $crate::error::ErrorCode::from(*self).fmt(f)
            }
        }

        impl core::fmt::Display for $Name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Debug::fmt(self, f)
            }
        }

        impl From<$Name> for $crate::error::ErrorCode {
            fn from(e: $Name) -> Self {
                match e {
                    $( $Name::$Variant => Self::$Variant, )*
                }
            }
        }
    };
}

pub(crate) use define_suberror;

define_suberror! {
    /// Errors from [`crate::task::task_create`].
    pub enum CreateTaskError {
        NoTcb,
        TinyStk,
        NoStk,
        BadPriority,
        BadParam,
    }
}

define_suberror! {
    /// Errors from [`crate::task::task_start`] / [`crate::task::task_restart`].
    pub enum StartTaskError {
        BadId,
        ObjDeleted,
        Active,
    }
}

define_suberror! {
    /// Errors from [`crate::task::task_suspend`].
    pub enum SuspendTaskError {
        BadId,
        ObjDeleted,
        Suspended,
    }
}

define_suberror! {
    /// Errors from [`crate::task::task_resume`].
    pub enum ResumeTaskError {
        BadId,
        ObjDeleted,
        NotSuspended,
    }
}

define_suberror! {
    /// Errors from [`crate::task::task_delete`].
    pub enum DeleteTaskError {
        BadId,
        ObjDeleted,
    }
}

define_suberror! {
    /// Errors from [`crate::task::task_setpri`].
    pub enum SetTaskPriorityError {
        BadId,
        ObjDeleted,
        BadPriority,
    }
}

define_suberror! {
    /// Errors from [`crate::task::task_getreg`]/[`crate::task::task_setreg`].
    pub enum TaskRegError {
        BadId,
        ObjDeleted,
        RegNum,
        Active,
    }
}

define_suberror! {
    /// Errors from [`crate::task::task_ident`], [`crate::semaphore::sem_ident`],
    /// and [`crate::queue::queue_ident`].
    pub enum IdentError {
        ObjNotFound,
    }
}

define_suberror! {
    /// Errors from [`crate::semaphore::sem_create`].
    pub enum CreateSemError {
        NoScb,
        BadParam,
    }
}

define_suberror! {
    /// Errors from [`crate::semaphore::sem_p`].
    pub enum SemWaitError {
        BadId,
        ObjDeleted,
        NoSem,
        Timeout,
    }
}

define_suberror! {
    /// Errors from [`crate::semaphore::sem_v`].
    pub enum SemSignalError {
        BadId,
        ObjDeleted,
        SemFull,
    }
}

define_suberror! {
    /// Errors from [`crate::event::ev_receive`].
    pub enum EventReceiveError {
        BadParam,
        NoEvs,
        Timeout,
    }
}

define_suberror! {
    /// Errors from [`crate::queue::queue_create`].
    pub enum CreateQueueError {
        NoQcb,
        NoMgb,
        BadParam,
    }
}

define_suberror! {
    /// Errors from [`crate::queue::queue_send`] / [`crate::queue::queue_urgent`].
    pub enum QueueSendError {
        BadId,
        ObjDeleted,
        QFull,
        BadParam,
    }
}

define_suberror! {
    /// Errors from [`crate::queue::queue_receive`].
    pub enum QueueReceiveError {
        BadId,
        ObjDeleted,
        NoMsg,
        Timeout,
        BadParam,
    }
}

define_suberror! {
    /// Errors from `timer_evafter`/`timer_evevery`/`timer_wkafter`.
    pub enum ArmTimerError {
        IllTicks,
        NoTimers,
    }
}

define_suberror! {
    /// Errors from `timer_evwhen`/`timer_wkwhen`.
    pub enum ArmTimerAtError {
        IllTicks,
        NoTimers,
        BadParam,
    }
}

define_suberror! {
    /// Errors from [`crate::event::ev_send`].
    pub enum EventSendError {
        BadId,
    }
}

define_suberror! {
    /// Errors from [`crate::timer::timer_cancel`].
    pub enum CancelTimerError {
        BadTmid,
    }
}
