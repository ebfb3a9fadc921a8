//! OpenCL status codes and their diagnostic names.
//!
//! The catalog is a static table sorted by code. Lookup never fails: any
//! value the runtime hands back, including vendor extensions and garbage,
//! resolves to a printable name.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name returned for codes outside the catalog.
pub const UNKNOWN_ERROR: &str = "CL_UNKNOWN_ERROR";

/// Result code of a compute API call.
///
/// `0` is success; negative values are failure categories defined by the
/// OpenCL headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub i32);

impl StatusCode {
    /// `CL_SUCCESS`.
    pub const SUCCESS: Self = Self(0);
    /// `CL_DEVICE_NOT_FOUND`.
    pub const DEVICE_NOT_FOUND: Self = Self(-1);
    /// `CL_OUT_OF_RESOURCES`.
    pub const OUT_OF_RESOURCES: Self = Self(-5);
    /// `CL_OUT_OF_HOST_MEMORY`.
    pub const OUT_OF_HOST_MEMORY: Self = Self(-6);
    /// `CL_BUILD_PROGRAM_FAILURE`.
    pub const BUILD_PROGRAM_FAILURE: Self = Self(-11);
    /// `CL_INVALID_VALUE`.
    pub const INVALID_VALUE: Self = Self(-30);
    /// `CL_INVALID_PLATFORM`.
    pub const INVALID_PLATFORM: Self = Self(-32);
    /// `CL_INVALID_DEVICE`.
    pub const INVALID_DEVICE: Self = Self(-33);
    /// `CL_INVALID_CONTEXT`.
    pub const INVALID_CONTEXT: Self = Self(-34);
    /// `CL_INVALID_BUILD_OPTIONS`.
    pub const INVALID_BUILD_OPTIONS: Self = Self(-43);
    /// `CL_INVALID_PROGRAM`.
    pub const INVALID_PROGRAM: Self = Self(-44);
    /// `CL_INVALID_PROGRAM_EXECUTABLE`.
    pub const INVALID_PROGRAM_EXECUTABLE: Self = Self(-45);
    /// `CL_INVALID_KERNEL_NAME`.
    pub const INVALID_KERNEL_NAME: Self = Self(-46);
    /// `CL_INVALID_KERNEL`.
    pub const INVALID_KERNEL: Self = Self(-48);

    /// Raw integer value.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Whether this is `CL_SUCCESS`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Whether the catalog has an entry for this code.
    #[must_use]
    pub fn is_known(self) -> bool {
        lookup(self.0).is_some()
    }

    /// Diagnostic name, e.g. `CL_INVALID_PROGRAM`.
    #[must_use]
    pub fn name(self) -> &'static str {
        describe(self)
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(describe(*self))
    }
}

// Sorted ascending by code for binary search.
static CATALOG: [(i32, &str); 61] = [
    (-70, "CL_INVALID_DEVICE_QUEUE"),
    (-69, "CL_INVALID_PIPE_SIZE"),
    (-68, "CL_INVALID_DEVICE_PARTITION_COUNT"),
    (-67, "CL_INVALID_LINKER_OPTIONS"),
    (-66, "CL_INVALID_COMPILER_OPTIONS"),
    (-65, "CL_INVALID_IMAGE_DESCRIPTOR"),
    (-64, "CL_INVALID_PROPERTY"),
    (-63, "CL_INVALID_GLOBAL_WORK_SIZE"),
    (-62, "CL_INVALID_MIP_LEVEL"),
    (-61, "CL_INVALID_BUFFER_SIZE"),
    (-60, "CL_INVALID_GL_OBJECT"),
    (-59, "CL_INVALID_OPERATION"),
    (-58, "CL_INVALID_EVENT"),
    (-57, "CL_INVALID_EVENT_WAIT_LIST"),
    (-56, "CL_INVALID_GLOBAL_OFFSET"),
    (-55, "CL_INVALID_WORK_ITEM_SIZE"),
    (-54, "CL_INVALID_WORK_GROUP_SIZE"),
    (-53, "CL_INVALID_WORK_DIMENSION"),
    (-52, "CL_INVALID_KERNEL_ARGS"),
    (-51, "CL_INVALID_ARG_SIZE"),
    (-50, "CL_INVALID_ARG_VALUE"),
    (-49, "CL_INVALID_ARG_INDEX"),
    (-48, "CL_INVALID_KERNEL"),
    (-47, "CL_INVALID_KERNEL_DEFINITION"),
    (-46, "CL_INVALID_KERNEL_NAME"),
    (-45, "CL_INVALID_PROGRAM_EXECUTABLE"),
    (-44, "CL_INVALID_PROGRAM"),
    (-43, "CL_INVALID_BUILD_OPTIONS"),
    (-42, "CL_INVALID_BINARY"),
    (-41, "CL_INVALID_SAMPLER"),
    (-40, "CL_INVALID_IMAGE_SIZE"),
    (-39, "CL_INVALID_IMAGE_FORMAT_DESCRIPTOR"),
    (-38, "CL_INVALID_MEM_OBJECT"),
    (-37, "CL_INVALID_HOST_PTR"),
    (-36, "CL_INVALID_COMMAND_QUEUE"),
    (-35, "CL_INVALID_QUEUE_PROPERTIES"),
    (-34, "CL_INVALID_CONTEXT"),
    (-33, "CL_INVALID_DEVICE"),
    (-32, "CL_INVALID_PLATFORM"),
    (-31, "CL_INVALID_DEVICE_TYPE"),
    (-30, "CL_INVALID_VALUE"),
    (-19, "CL_KERNEL_ARG_INFO_NOT_AVAILABLE"),
    (-18, "CL_DEVICE_PARTITION_FAILED"),
    (-17, "CL_LINK_PROGRAM_FAILURE"),
    (-16, "CL_LINKER_NOT_AVAILABLE"),
    (-15, "CL_COMPILE_PROGRAM_FAILURE"),
    (-14, "CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST"),
    (-13, "CL_MISALIGNED_SUB_BUFFER_OFFSET"),
    (-12, "CL_MAP_FAILURE"),
    (-11, "CL_BUILD_PROGRAM_FAILURE"),
    (-10, "CL_IMAGE_FORMAT_NOT_SUPPORTED"),
    (-9, "CL_IMAGE_FORMAT_MISMATCH"),
    (-8, "CL_MEM_COPY_OVERLAP"),
    (-7, "CL_PROFILING_INFO_NOT_AVAILABLE"),
    (-6, "CL_OUT_OF_HOST_MEMORY"),
    (-5, "CL_OUT_OF_RESOURCES"),
    (-4, "CL_MEM_OBJECT_ALLOCATION_FAILURE"),
    (-3, "CL_COMPILER_NOT_AVAILABLE"),
    (-2, "CL_DEVICE_NOT_AVAILABLE"),
    (-1, "CL_DEVICE_NOT_FOUND"),
    (0, "CL_SUCCESS"),
];

fn lookup(code: i32) -> Option<&'static str> {
    CATALOG
        .binary_search_by_key(&code, |&(c, _)| c)
        .ok()
        .map(|i| CATALOG[i].1)
}

/// Translate a status code into its diagnostic name.
///
/// Total and pure: codes outside the catalog yield [`UNKNOWN_ERROR`].
#[must_use]
pub fn describe(code: StatusCode) -> &'static str {
    lookup(code.0).unwrap_or(UNKNOWN_ERROR)
}

/// Every catalogued code with its name, from `CL_SUCCESS` downwards.
pub fn known_codes() -> impl DoubleEndedIterator<Item = (StatusCode, &'static str)> + ExactSizeIterator {
    CATALOG.iter().rev().map(|&(c, name)| (StatusCode(c), name))
}

/// Turn a raw status into a `Result`.
pub fn check(status: i32) -> Result<(), StatusCode> {
    if status == 0 {
        Ok(())
    } else {
        Err(StatusCode(status))
    }
}
