use super::*;
use std::fs;
use tempfile::{tempdir, TempDir};

const LUA_SRC_MAKEFILE: &str = "# makefile for building Lua

# == CHANGE THE SETTINGS BELOW TO SUIT YOUR ENVIRONMENT =======================

PLAT= none

CC= gcc
CFLAGS= -O2 -Wall $(MYCFLAGS)
AR= ar rcu
RANLIB= ranlib
RM= rm -f
LIBS= -lm $(MYLIBS)

MYCFLAGS=
MYLDFLAGS=
MYLIBS=

LUA_A=	liblua.a
LUA_T=	lua
LUAC_T=	luac

ALL_T= $(LUA_A) $(LUA_T) $(LUAC_T)

default: $(PLAT)

all:	$(ALL_T)
";

const LUA_ROOT_MAKEFILE: &str = "PLAT= none

INSTALL_TOP= /usr/local
INSTALL_BIN= $(INSTALL_TOP)/bin

TO_BIN= lua luac
TO_INC= lua.h luaconf.h lualib.h lauxlib.h ../etc/lua.hpp
TO_LIB= liblua.a
TO_MAN= lua.1 luac.1

install: dummy
\tcd src && $(MKDIR) $(INSTALL_BIN) $(INSTALL_INC) $(INSTALL_LIB) $(INSTALL_MAN)
\tcd src && $(INSTALL_EXEC) $(TO_BIN) $(INSTALL_BIN)
\tcd src && $(INSTALL_DATA) $(TO_INC) $(INSTALL_INC)
\tcd src && $(INSTALL_DATA) $(TO_LIB) $(INSTALL_LIB)
\tcd doc && $(INSTALL_DATA) $(TO_MAN) $(INSTALL_MAN)

ranlib:
\tcd src && cd $(INSTALL_LIB) && $(RANLIB) $(TO_LIB)
";

const LUA_LUACONF: &str = "#if defined(LUA_USE_LINUX)
#define LUA_USE_POSIX
#define LUA_USE_DLOPEN
#define LUA_USE_READLINE
#endif

#define LUA_ROOT\t\"/usr/local/\"

#if defined(LUA_USE_MKSTEMP)
#include <unistd.h>
#define LUA_TMPNAMBUFSIZE\t32
#define lua_tmpnam(b,e)\t{ \\
\tstrcpy(b, \"/tmp/lua_XXXXXX\"); \\
\te = mkstemp(b); \\
\tif (e != -1) close(e); \\
\te = (e == -1); }
#else
#define LUA_TMPNAMBUFSIZE\tL_tmpnam
#define lua_tmpnam(b,e)\t\t{ e = (tmpnam(b) == NULL); }
#endif
";

const LUA_LOSLIB: &str = "static int os_execute (lua_State *L) {
  lua_pushinteger(L, system(luaL_optstring(L, 1, NULL)));
  return 1;
}


static int os_remove (lua_State *L) {
  const char *filename = luaL_checkstring(L, 1);
  return os_pushresult(L, remove(filename) == 0, filename);
}

static int os_tmpname (lua_State *L) {
  char buff[LUA_TMPNAMBUFSIZE];
  int err;
  lua_tmpnam(buff, err);
  if (err)
    return luaL_error(L, \"unable to generate a unique filename\");
  lua_pushstring(L, buff);
  return 1;
}
";

const LUA_LIOLIB: &str = "static int io_tmpfile (lua_State *L) {
  FILE **pf = newfile(L);
  *pf = tmpfile();
  return (*pf == NULL) ? pushresult(L, 0, NULL) : 1;
}


static int io_close (lua_State *L) {
  if (lua_isnone(L, 1))
    lua_rawgeti(L, LUA_ENVIRONINDEX, IO_OUTPUT);
  return f_close(L);
}
";

const LUA_CLI_C: &str = "#include <signal.h>
#include <stdio.h>
#include <stdlib.h>

static void laction (int i) {
  signal(i, SIG_DFL);
  lua_sethook(globalL, lstop, LUA_MASKCALL | LUA_MASKRET | LUA_MASKCOUNT, 1);
}
";

const LUV_H: &str = "#ifndef LUV_H
#define LUV_H
#include <lua.h>
#include <lauxlib.h>
#include \"uv.h\"
#endif
";

const LUV_CONSTANTS: &str = "static int luv_proto_string_to_num(const char* string) {
  struct protoent* proto;
  if (!string) return -1;
  proto = getprotobyname(string);
  if (!proto) return -1;
  return proto->p_proto;
}

static const char* luv_proto_num_to_string(int num) {
  struct protoent* proto = getprotobynumber(num);
  return proto ? proto->p_name : NULL;
}

static int luv_af_string_to_num(const char* string) {
  if (!string) return AF_UNSPEC;
  return -1;
}
";

const LUV_MISC: &str = "static int luv_getuid(lua_State* L){
  int uid = getuid();
  lua_pushinteger(L, uid);
  return 1;
}

static int luv_getgid(lua_State* L){
  int gid = getgid();
  lua_pushinteger(L, gid);
  return 1;
}

static int luv_setuid(lua_State* L){
  int uid = luaL_checkinteger(L, 1);
  int r = setuid(uid);
  if (-1 == r) {
    luaL_error(L, \"Error setting UID\");
  }
  return 0;
}

static int luv_setgid(lua_State* L){
  int gid = luaL_checkinteger(L, 1);
  int r = setgid(gid);
  if (-1 == r) {
    luaL_error(L, \"Error setting GID\");
  }
  return 0;
}

static int luv_hrtime(lua_State* L) {
  lua_pushinteger(L, uv_hrtime());
  return 1;
}
";

const LUV_WORK: &str = "static int luv_queue_work(lua_State* L) {
  int top = lua_gettop(L);
  luv_work_ctx_t* ctx = luv_check_work_ctx(L, 1);
  luv_work_t* work = (luv_work_t*)malloc(sizeof(*work));
  int ret;
  luv_thread_arg_set(L, &work->args, 2, top, 0);
  ret = uv_queue_work(ctx->ctx->loop, &work->work, luv_work_cb, luv_after_work_cb);
  if (ret < 0) {
    free(work);
    return luv_error(L, ret);
  }
  lua_pushboolean(L, 1);
  return 1;
}

static const luaL_Reg luv_work_ctx_methods[] = {
  {\"queue\", luv_queue_work},
  {NULL, NULL}
};
";

const LUV_DNS: &str = "#include \"private.h\"
#include <netdb.h>

static void luv_pushaddrinfo(lua_State* L, struct addrinfo* res) {
}
";

const LIBUV_STUB: &str = "#include \"uv.h\"
#include \"internal.h\"
#include <errno.h>

int uv_exepath(char* buffer, size_t* size) {
  return UV_ENOSYS;
}

int uv_utf16_to_wtf8(const uint16_t* utf16, ssize_t utf16_len, char** wtf8_ptr, size_t* wtf8_len_ptr) {
  size_t needed;
  if (utf16 == NULL)
";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn lua_tree() -> TempDir {
    let temp = tempdir().expect("Failed to create temp dir");
    let root = temp.path();
    write(root, lua::BUILD_MAKEFILE, LUA_SRC_MAKEFILE);
    write(root, lua::ROOT_MAKEFILE, LUA_ROOT_MAKEFILE);
    write(root, lua::LUACONF, LUA_LUACONF);
    write(root, lua::LOSLIB, LUA_LOSLIB);
    write(root, lua::LIOLIB, LUA_LIOLIB);
    write(root, lua::LUA_CLI, LUA_CLI_C);
    temp
}

fn luv_tree() -> TempDir {
    let temp = tempdir().expect("Failed to create temp dir");
    let root = temp.path();
    write(root, luv::LUV_HEADER, LUV_H);
    write(root, luv::CONSTANTS, LUV_CONSTANTS);
    write(root, luv::MISC, LUV_MISC);
    write(root, luv::WORK, LUV_WORK);
    write(root, luv::DNS, LUV_DNS);
    temp
}

fn libuv_tree() -> TempDir {
    let temp = tempdir().expect("Failed to create temp dir");
    write(temp.path(), libuv::WASI_STUB, LIBUV_STUB);
    temp
}

fn lua_ctx() -> PatchContext {
    PatchContext {
        cc: "/opt/wasi-sdk/bin/clang".to_string(),
        cflags: "-D_WASI_EMULATED_SIGNAL -I/repo/patches/wasi-shim/include".to_string(),
        ldflags: "--target=wasm32-wasi -lsetjmp".to_string(),
        install_dir: "/build/deps/usr".to_string(),
    }
}

fn snapshot(root: &Path, family: DependencyFamily) -> Vec<(String, String)> {
    let mut targets: Vec<_> = steps_for(family).iter().map(|s| s.target).collect();
    targets.sort_unstable();
    targets.dedup();
    targets
        .into_iter()
        .map(|t| (t.to_string(), fs::read_to_string(root.join(t)).unwrap()))
        .collect()
}

fn run_all(patcher: &SourcePatcher, family: DependencyFamily, ctx: &PatchContext) -> Vec<StepOutcome> {
    steps_for(family)
        .iter()
        .map(|step| patcher.run_step(step, ctx, false).unwrap())
        .collect()
}

#[test]
fn test_lua_family_applies_then_is_stable() {
    let tree = lua_tree();
    let ctx = lua_ctx();
    let patcher = SourcePatcher::new(tree.path().to_path_buf()).unwrap();

    let first = run_all(&patcher, DependencyFamily::Lua, &ctx);
    assert!(first.iter().all(|o| *o == StepOutcome::Applied), "{:?}", first);
    let after_first = snapshot(tree.path(), DependencyFamily::Lua);

    let second = run_all(&patcher, DependencyFamily::Lua, &ctx);
    assert!(second.iter().all(|o| *o == StepOutcome::AlreadyApplied), "{:?}", second);
    assert_eq!(snapshot(tree.path(), DependencyFamily::Lua), after_first);

    let makefile = fs::read_to_string(tree.path().join(lua::BUILD_MAKEFILE)).unwrap();
    assert!(makefile.contains("CC= /opt/wasi-sdk/bin/clang\n"));
    assert!(makefile.contains("ALL_T= $(LUA_A)\n"));
    assert!(makefile.contains("MYLDFLAGS= --target=wasm32-wasi -lsetjmp\n"));
}

#[test]
fn test_lua_link_flags_not_requested_without_ldflags() {
    let tree = lua_tree();
    let mut ctx = lua_ctx();
    ctx.ldflags.clear();
    let patcher = SourcePatcher::new(tree.path().to_path_buf()).unwrap();
    let step = find_step(DependencyFamily::Lua, "set-link-flags").unwrap();

    assert_eq!(
        patcher.run_step(step, &ctx, false).unwrap(),
        StepOutcome::NotRequested
    );
    let makefile = fs::read_to_string(tree.path().join(lua::BUILD_MAKEFILE)).unwrap();
    assert!(makefile.contains("MYLDFLAGS=\n"));
}

#[test]
fn test_luv_family_applies_then_is_stable() {
    let tree = luv_tree();
    let ctx = PatchContext::default();
    let patcher = SourcePatcher::new(tree.path().to_path_buf()).unwrap();

    let first = run_all(&patcher, DependencyFamily::Luv, &ctx);
    assert!(first.iter().all(|o| *o == StepOutcome::Applied), "{:?}", first);
    let after_first = snapshot(tree.path(), DependencyFamily::Luv);

    let second = run_all(&patcher, DependencyFamily::Luv, &ctx);
    assert!(second.iter().all(|o| *o == StepOutcome::AlreadyApplied), "{:?}", second);
    assert_eq!(snapshot(tree.path(), DependencyFamily::Luv), after_first);

    let misc = fs::read_to_string(tree.path().join(luv::MISC)).unwrap();
    assert!(misc.contains("static int luv_hrtime(lua_State* L) {\n  lua_pushinteger(L, uv_hrtime());"));
    let work = fs::read_to_string(tree.path().join(luv::WORK)).unwrap();
    assert!(work.contains("luv_work_ctx_methods"));
}

#[test]
fn test_libuv_family_applies_then_is_stable() {
    let tree = libuv_tree();
    let ctx = PatchContext::default();
    let patcher = SourcePatcher::new(tree.path().to_path_buf()).unwrap();

    let first = run_all(&patcher, DependencyFamily::Libuv, &ctx);
    assert_eq!(first, vec![StepOutcome::Applied, StepOutcome::Applied]);
    let stub = fs::read_to_string(tree.path().join(libuv::WASI_STUB)).unwrap();
    assert!(libuv::missing_primitives(&stub).is_empty());
    assert_eq!(stub.matches("int uv_utf16_to_wtf8(").count(), 1);
    assert!(stub.contains("int uv_exepath(char* buffer, size_t* size) {"));

    let second = run_all(&patcher, DependencyFamily::Libuv, &ctx);
    assert_eq!(
        second,
        vec![StepOutcome::AlreadyApplied, StepOutcome::AlreadyApplied]
    );
    assert_eq!(
        fs::read_to_string(tree.path().join(libuv::WASI_STUB)).unwrap(),
        stub
    );
}

#[test]
fn test_missing_target_is_fatal() {
    let tree = luv_tree();
    fs::remove_file(tree.path().join(luv::WORK)).unwrap();
    let patcher = SourcePatcher::new(tree.path().to_path_buf()).unwrap();
    let step = find_step(DependencyFamily::Luv, "stub-queue-work").unwrap();

    let err = patcher
        .run_step(step, &PatchContext::default(), false)
        .unwrap_err();
    assert!(matches!(err, PatchError::FileNotFound(p) if p.ends_with("src/work.c")));
}

#[test]
fn test_missing_tree_is_fatal() {
    let temp = tempdir().expect("Failed to create temp dir");
    let err = SourcePatcher::new(temp.path().join("src/luv")).unwrap_err();
    assert!(matches!(err, PatchError::SourceDirNotFound(_)));
}

#[test]
fn test_missing_anchor_is_reported_not_silent() {
    let tree = lua_tree();
    write(tree.path(), lua::LUA_CLI, "#include <stdio.h>\n");
    let patcher = SourcePatcher::new(tree.path().to_path_buf()).unwrap();
    let step = find_step(DependencyFamily::Lua, "neutralize-signal").unwrap();

    assert_eq!(
        patcher.run_step(step, &lua_ctx(), false).unwrap(),
        StepOutcome::PreconditionMissing
    );
    assert_eq!(
        fs::read_to_string(tree.path().join(lua::LUA_CLI)).unwrap(),
        "#include <stdio.h>\n"
    );
}

#[test]
fn test_ledger_skips_only_replace_once_steps() {
    let tree = luv_tree();
    let patcher = SourcePatcher::new(tree.path().to_path_buf()).unwrap();
    let ctx = PatchContext::default();

    let dns = find_step(DependencyFamily::Luv, "stub-dns").unwrap();
    write(tree.path(), luv::DNS, "/* resolver removed by hand */\n");
    assert_eq!(
        patcher.run_step(dns, &ctx, true).unwrap(),
        StepOutcome::SkippedByLedger
    );
    assert_eq!(
        fs::read_to_string(tree.path().join(luv::DNS)).unwrap(),
        "/* resolver removed by hand */\n"
    );

    let guard = find_step(DependencyFamily::Luv, "add-emulation-guard").unwrap();
    assert_eq!(
        patcher.run_step(guard, &ctx, true).unwrap(),
        StepOutcome::Applied
    );
}

#[test]
fn test_recorded_step_on_upstream_text_is_reapplied() {
    let tree = luv_tree();
    let patcher = SourcePatcher::new(tree.path().to_path_buf()).unwrap();
    let ctx = PatchContext::default();

    let dns = find_step(DependencyFamily::Luv, "stub-dns").unwrap();
    assert_eq!(
        patcher.run_step(dns, &ctx, true).unwrap(),
        StepOutcome::Applied
    );
    assert_eq!(
        fs::read_to_string(tree.path().join(luv::DNS)).unwrap(),
        templates::LUV_DNS_STUB
    );

    let identity = find_step(DependencyFamily::Luv, "stub-identity-calls").unwrap();
    assert_eq!(
        patcher.run_step(identity, &ctx, true).unwrap(),
        StepOutcome::Applied
    );
    assert!(!fs::read_to_string(tree.path().join(luv::MISC))
        .unwrap()
        .contains("getuid()"));
}

#[test]
fn test_write_keeps_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let tree = luv_tree();
    let path = tree.path().join(luv::LUV_HEADER);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

    apply_step(
        tree.path(),
        find_step(DependencyFamily::Luv, "add-emulation-guard").unwrap(),
        &PatchContext::default(),
    )
    .unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
}
