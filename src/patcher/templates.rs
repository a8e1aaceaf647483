//! Replacement text injected into vendored sources.
//!
//! Every template here is matched back verbatim by the applied-predicates in
//! the family modules, so edits to these strings change what counts as
//! "already patched".

// ============================================================================
// LUA
// ============================================================================

/// Extra defines appended to the composed compile flags for Lua
pub const LUA_EXTRA_CFLAGS: &str =
    "-O2 -g3 -fPIC -DLUA_TMPNAMBUFSIZE=32 -D_WASI_EMULATED_PROCESS_CLOCKS";

/// Only the static library target survives; lua/luac cannot link on WASI
pub const LUA_ALL_TARGETS: &str = "$(LUA_A)";

pub const LUA_INSTALL_RECIPE: &str = "install: dummy\n\
\tcd src && $(MKDIR) $(INSTALL_INC) $(INSTALL_LIB) $(INSTALL_LMOD) $(INSTALL_CMOD)\n\
\tcd src && $(INSTALL_DATA) $(TO_INC) $(INSTALL_INC)\n\
\tcd src && $(INSTALL_DATA) $(TO_LIB) $(INSTALL_LIB)\n";

pub const LUA_TMPNAMBUFSIZE_DEFINE: &str = "#define LUA_TMPNAMBUFSIZE 32";

pub const LUA_TMPNAM_DEFINE: &str = "#define lua_tmpnam(b,e) { e = 1; }";

pub const LUA_OS_EXECUTE_STUB: &str = "static int os_execute (lua_State *L) {
  return luaL_error(L, \"os.execute is not supported on WASI\");
}
";

pub const LUA_IO_TMPFILE_STUB: &str = "static int io_tmpfile (lua_State *L) {
  return luaL_error(L, \"io.tmpfile is not supported on WASI\");
}
";

pub const LUA_SIGNAL_INCLUDE: &str = "#include <signal.h>\n";

pub const LUA_SIGNAL_GUARD: &str = "#if defined(__wasi__)\n\
#define signal(a,b) ((void)0)\n\
#endif\n";

// ============================================================================
// LUV
// ============================================================================

pub const LUV_UV_INCLUDE: &str = "#include \"uv.h\"\n";

pub const LUV_SIGNAL_GUARD: &str = "#if defined(__wasi__)\n\
#define _WASI_EMULATED_SIGNAL 1\n\
#endif\n";

pub const LUV_PROTO_STRING_TO_NUM_STUB: &str = "static int luv_proto_string_to_num(const char* string) {
  (void)string;
  return -1;
}
";

pub const LUV_PROTO_NUM_TO_STRING_STUB: &str = "static const char* luv_proto_num_to_string(int num) {
  (void)num;
  return NULL;
}
";

pub const LUV_GETUID_STUB: &str =
    "static int luv_getuid(lua_State* L){ return luv_error(L, UV_ENOSYS); }\n";
pub const LUV_GETGID_STUB: &str =
    "static int luv_getgid(lua_State* L){ return luv_error(L, UV_ENOSYS); }\n";
pub const LUV_SETUID_STUB: &str =
    "static int luv_setuid(lua_State* L){ return luv_error(L, UV_ENOSYS); }\n";
pub const LUV_SETGID_STUB: &str =
    "static int luv_setgid(lua_State* L){ return luv_error(L, UV_ENOSYS); }\n";

pub const LUV_QUEUE_WORK_STUB: &str = "static int luv_queue_work(lua_State* L) {
  (void)L;
  return luv_error(L, UV_ENOSYS);
}
";

pub const LUV_DNS_STUB: &str = "/* WASI stub: DNS resolution is not available. */\n\
#include \"private.h\"\n\
\n\
int luv_getaddrinfo(lua_State* L) { return luv_error(L, UV_ENOSYS); }\n\
int luv_getnameinfo(lua_State* L) { return luv_error(L, UV_ENOSYS); }\n";

// ============================================================================
// LIBUV (src/wasi/stub.c)
// ============================================================================

/// Header line for the appended primitives
pub const LIBUV_EXTRA_HEADER: &str =
    "// Extra stubs injected for WASI build (single-threaded, no TLS).\n";

/// Degenerate single-threaded primitives, keyed by the symbol each one defines.
/// Only the entries whose definition is absent get appended.
pub const LIBUV_PRIMITIVES: &[(&str, &str)] = &[
    (
        "uv_once",
        "void uv_once(uv_once_t* guard, void (*callback)(void)) {
  if (guard && *guard) {
    return;
  }
  if (callback) {
    callback();
  }
  if (guard) {
    *guard = 1;
  }
}
",
    ),
    (
        "uv_key_create",
        "int uv_key_create(uv_key_t* key) {
  if (key) {
    memset(key, 0, sizeof(*key));
  }
  return 0;
}
",
    ),
    (
        "uv_key_delete",
        "void uv_key_delete(uv_key_t* key) {
  UV__UNUSED(key);
}
",
    ),
    (
        "uv_key_get",
        "void* uv_key_get(uv_key_t* key) {
  UV__UNUSED(key);
  return NULL;
}
",
    ),
    (
        "uv_key_set",
        "void uv_key_set(uv_key_t* key, void* value) {
  UV__UNUSED(key);
  UV__UNUSED(value);
}
",
    ),
    (
        "uv_gettimeofday",
        "int uv_gettimeofday(uv_timeval64_t* tv) {
  if (!tv) {
    return UV_EINVAL;
  }
  struct timespec ts;
  if (clock_gettime(CLOCK_REALTIME, &ts) != 0) {
    return -errno;
  }
  tv->tv_sec = ts.tv_sec;
  tv->tv_usec = ts.tv_nsec / 1000;
  return 0;
}
",
    ),
    (
        "uv_thread_create",
        "int uv_thread_create(uv_thread_t* tid, uv_thread_cb entry, void* arg) {
  UV__UNUSED(tid);
  UV__UNUSED(entry);
  UV__UNUSED(arg);
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_thread_detach",
        "int uv_thread_detach(uv_thread_t* tid) {
  UV__UNUSED(tid);
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_thread_create_ex",
        "int uv_thread_create_ex(uv_thread_t* tid, const uv_thread_options_t* params, uv_thread_cb entry, void* arg) {
  UV__UNUSED(tid);
  UV__UNUSED(params);
  UV__UNUSED(entry);
  UV__UNUSED(arg);
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_thread_setaffinity",
        "int uv_thread_setaffinity(uv_thread_t* tid, char* cpumask, char* oldmask, size_t mask_size) {
  UV__UNUSED(tid);
  UV__UNUSED(cpumask);
  UV__UNUSED(oldmask);
  UV__UNUSED(mask_size);
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_thread_getaffinity",
        "int uv_thread_getaffinity(uv_thread_t* tid, char* cpumask, size_t mask_size) {
  UV__UNUSED(tid);
  UV__UNUSED(cpumask);
  UV__UNUSED(mask_size);
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_thread_getcpu",
        "int uv_thread_getcpu(void) {
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_thread_self",
        "uv_thread_t uv_thread_self(void) {
  uv_thread_t out; memset(&out, 0, sizeof(out)); return out;
}
",
    ),
    (
        "uv_thread_join",
        "int uv_thread_join(uv_thread_t *tid) {
  UV__UNUSED(tid);
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_thread_equal",
        "int uv_thread_equal(const uv_thread_t* t1, const uv_thread_t* t2) {
  UV__UNUSED(t1);
  UV__UNUSED(t2);
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_thread_setname",
        "int uv_thread_setname(const char* name) {
  UV__UNUSED(name);
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_thread_getname",
        "int uv_thread_getname(uv_thread_t* tid, char* name, size_t size) {
  UV__UNUSED(tid);
  UV__UNUSED(name);
  UV__UNUSED(size);
  return UV_ENOSYS;
}
",
    ),
    (
        "uv_loop_get_data",
        "void* uv_loop_get_data(const uv_loop_t* arg0) {
  UV__UNUSED(arg0);
  return NULL;
}
",
    ),
    (
        "uv_loop_set_data",
        "void uv_loop_set_data(uv_loop_t* arg0, void* data) {
  UV__UNUSED(arg0);
  UV__UNUSED(data);
}
",
    ),
];

/// Canonical replacement for the truncated UTF-16/WTF-8 helper tail
pub const LIBUV_UTF16_TAIL: &str = "int uv_utf16_to_wtf8(const uint16_t* utf16, ssize_t utf16_len, char** wtf8_ptr, size_t* wtf8_len_ptr) {
  UV__UNUSED(utf16);
  UV__UNUSED(utf16_len);
  UV__UNUSED(wtf8_ptr);
  UV__UNUSED(wtf8_len_ptr);
  return UV_ENOSYS;
}

ssize_t uv_wtf8_length_as_utf16(const char* wtf8) {
  UV__UNUSED(wtf8);
  return 0;
}

void uv_wtf8_to_utf16(const char* wtf8, uint16_t* utf16, size_t utf16_len) {
  UV__UNUSED(wtf8);
  UV__UNUSED(utf16);
  UV__UNUSED(utf16_len);
}
";
